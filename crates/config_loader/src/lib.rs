//! # Config Loader
//!
//! Engine settings loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON settings files
//! - Validate settings legality
//! - Generate `EngineSettings`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_from_path(Path::new("timelink.toml")).unwrap();
//! println!("retry limit: {}", settings.engine.retry_limit);
//! ```

mod parser;
mod validator;

pub use contracts::EngineSettings;
pub use parser::ConfigFormat;

use contracts::LinkError;
use std::path::Path;

/// Settings loader
///
/// Provides static methods to load settings from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<EngineSettings, LinkError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load settings from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<EngineSettings, LinkError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate settings built in code (e.g. after CLI overrides)
    pub fn validate(settings: &EngineSettings) -> Result<(), LinkError> {
        validator::validate(settings)
    }

    /// Serialize EngineSettings to TOML string
    pub fn to_toml(settings: &EngineSettings) -> Result<String, LinkError> {
        toml::to_string_pretty(settings)
            .map_err(|e| LinkError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize EngineSettings to JSON string
    pub fn to_json(settings: &EngineSettings) -> Result<String, LinkError> {
        serde_json::to_string_pretty(settings)
            .map_err(|e| LinkError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer settings format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, LinkError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            LinkError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| LinkError::config_parse(format!("unsupported config format: .{ext}")))
    }

    fn read_file(path: &Path) -> Result<String, LinkError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<EngineSettings, LinkError> {
        let settings = parser::parse(content, format)?;
        validator::validate(&settings)?;
        Ok(settings)
    }
}
