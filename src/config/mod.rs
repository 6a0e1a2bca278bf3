// Configuration management module
// Reads and writes the TOML file holding default retrieval settings

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
