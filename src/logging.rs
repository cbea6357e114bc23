use tracing_subscriber::EnvFilter;

use crate::reflect::util::env_non_empty;

/// Install the stderr subscriber. `REFLECT_LOG` takes precedence over the
/// verbosity flag; `REFLECT_LOG_FORMAT=json` switches to JSON lines.
pub fn init(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = env_non_empty("REFLECT_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(default_level));

    let json = env_non_empty("REFLECT_LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
