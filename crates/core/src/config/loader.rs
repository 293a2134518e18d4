use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
///
/// Nested keys use a double underscore, e.g.
/// `CROSSFADE_APPLE_MUSIC__STOREFRONT=gb`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    extract(path)
}

/// Like [`load_config`], but a missing file contributes nothing instead of
/// failing. Defaults and environment overrides still apply.
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    extract(path)
}

fn extract(path: &Path) -> Result<Config, ConfigError> {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("CROSSFADE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
