//! Process setup.

use probescope_core::config::{Config, ConfigPaths};
use probescope_core::error::Result;
use probescope_core::options::default_root;

/// Installs the `env_logger` backend for the `log` macros.
///
/// Controlled by `RUST_LOG`. Calling it again, or after another logger has been
/// installed, does nothing.
pub fn init_logging() {
    let _ = env_logger::try_init();
}

/// Loads configuration from `$HOME/.probescope`, creating missing files.
pub fn load_default_config() -> Result<Config> {
    init_logging();
    Config::load(ConfigPaths::new(default_root()))
}
