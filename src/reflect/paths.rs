use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ReflectPaths {
    pub reflect_home: PathBuf,
    pub entries_file: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<ReflectPaths> {
    let reflect_home = match env::var("REFLECT_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("reflect"),
    };
    let entries_file = env_or_default_path("REFLECT_ENTRIES_FILE", reflect_home.join("entries.jsonl"));
    let logs_dir = env_or_default_path("REFLECT_LOGS_DIR", reflect_home.join("logs"));

    Ok(ReflectPaths {
        reflect_home,
        entries_file,
        logs_dir,
    })
}

impl ReflectPaths {
    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }
}
