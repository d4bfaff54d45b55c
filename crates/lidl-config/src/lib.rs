//! Configuration for the `lidl-plus` command line tool.
//!
//! Provides TOML-based defaults for the account locale and login behaviour,
//! layered from the user config directory and a project-local file. Command
//! line flags and environment variables override everything loaded here.
//!
//! Tokens and passwords are never read from config files.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
