pub mod audit;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod entries;
pub mod fallback;
pub mod features;
pub mod parser;
pub mod paths;
pub mod prompt;
pub mod providers;
pub mod summary;
pub mod util;
