//! Configuration for citemigrate
//!
//! Loaded from a TOML file with the following structure (every key optional):
//!
//! ```toml
//! [library]
//! id = "475425"
//! kind = "user"            # or "group"
//! api_key = "..."          # ZOTERO_API_KEY in the environment wins
//!
//! [conversion]
//! style_uri = "http://www.zotero.org/styles/apa"
//! verify = true
//! output_suffix = "_zotero"
//!
//! [matching]
//! year_weight = 2.0
//! author_weight = 3.0
//! title_weight = 5.0
//! title_ratio_threshold = 0.6
//! accept_threshold = 3.0
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use zotero_client::{ApiKey, LibraryKind, LibraryRef, DEFAULT_BASE_URL};

use crate::error::ConfigError;

pub const DEFAULT_STYLE_URI: &str = "http://www.zotero.org/styles/harvard-cite-them-right";

/// Environment variable consulted for the API key
pub const API_KEY_ENV: &str = "ZOTERO_API_KEY";

/// Maximum characters per `w:instrText` run in synthesized fields
pub const DEFAULT_INSTRUCTION_CHUNK: usize = 250;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CiteMigrateConfig {
    pub library: LibraryConfig,
    pub conversion: ConversionConfig,
    pub matching: MatchWeights,
}

/// Which Zotero library to match against
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Numeric user or group id
    pub id: String,
    pub kind: LibraryKind,
    pub api_key: Option<ApiKey>,
    /// Name of the environment variable that overrides `api_key`
    pub api_key_env: String,
    pub base_url: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: LibraryKind::User,
            api_key: None,
            api_key_env: API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Document conversion settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// CSL style Zotero applies on first refresh
    pub style_uri: String,
    /// Compare original and converted packages after each conversion
    pub verify: bool,
    /// Appended to the input file stem for the output file
    pub output_suffix: String,
    pub instruction_chunk_size: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            style_uri: DEFAULT_STYLE_URI.to_string(),
            verify: true,
            output_suffix: "_zotero".to_string(),
            instruction_chunk_size: DEFAULT_INSTRUCTION_CHUNK,
        }
    }
}

/// Fuzzy-match scoring constants.
///
/// These values were tuned by hand against real Citavi documents. They are
/// knobs, not derived quantities.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    /// Added when the citation year occurs in the item date
    pub year_weight: f64,
    /// Added when the primary author matches a creator
    pub author_weight: f64,
    /// Multiplied by the title token-overlap ratio
    pub title_weight: f64,
    /// Title overlap only counts above this ratio
    pub title_ratio_threshold: f64,
    /// Minimum total score for a fuzzy match
    pub accept_threshold: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            year_weight: 2.0,
            author_weight: 3.0,
            title_weight: 5.0,
            title_ratio_threshold: 0.6,
            accept_threshold: 3.0,
        }
    }
}

impl CiteMigrateConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// `<config dir>/citemigrate/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("citemigrate").join("config.toml"))
    }

    /// Load the default config file, falling back to defaults when absent
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn library_ref(&self) -> Result<LibraryRef, ConfigError> {
        let id = self.library.id.trim();
        if id.is_empty() {
            return Err(ConfigError::MissingLibraryId);
        }
        Ok(LibraryRef {
            id: id.to_string(),
            kind: self.library.kind,
        })
    }

    /// API key from the environment, else from the file
    pub fn api_key(&self) -> Result<ApiKey, ConfigError> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    pub(crate) fn api_key_with<F>(&self, lookup: F) -> Result<ApiKey, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = lookup(&self.library.api_key_env)
            .map(ApiKey::new)
            .filter(|k| !k.is_empty());
        from_env
            .or_else(|| self.library.api_key.clone().filter(|k| !k.is_empty()))
            .ok_or_else(|| ConfigError::MissingApiKey(self.library.api_key_env.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CiteMigrateConfig::default();
        assert_eq!(config.conversion.style_uri, DEFAULT_STYLE_URI);
        assert_eq!(config.conversion.instruction_chunk_size, 250);
        assert!(config.conversion.verify);
        assert_eq!(config.matching.accept_threshold, 3.0);
        assert_eq!(config.library.api_key_env, "ZOTERO_API_KEY");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = CiteMigrateConfig::from_toml_str(
            r#"
            [library]
            id = "42"
            kind = "group"

            [matching]
            accept_threshold = 4.5
            "#,
        )
        .unwrap();
        assert_eq!(config.library.id, "42");
        assert_eq!(config.library.kind, LibraryKind::Group);
        assert_eq!(config.matching.accept_threshold, 4.5);
        assert_eq!(config.matching.year_weight, 2.0);
        assert_eq!(config.conversion.output_suffix, "_zotero");

        let library = config.library_ref().unwrap();
        assert_eq!(library.path(), "groups/42");
    }

    #[test]
    fn test_invalid_toml() {
        let err = CiteMigrateConfig::from_toml_str("[library\nid=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_library_id() {
        let config = CiteMigrateConfig::default();
        assert!(matches!(
            config.library_ref(),
            Err(ConfigError::MissingLibraryId)
        ));
    }

    #[test]
    fn test_env_key_wins_over_file() {
        let config = CiteMigrateConfig::from_toml_str(
            r#"
            [library]
            id = "1"
            api_key = "from-file-key"
            "#,
        )
        .unwrap();

        let key = config
            .api_key_with(|name| (name == API_KEY_ENV).then(|| "from-env-key".to_string()))
            .unwrap();
        assert_eq!(key.expose(), "from-env-key");

        let key = config.api_key_with(|_| None).unwrap();
        assert_eq!(key.expose(), "from-file-key");
    }

    #[test]
    fn test_missing_key() {
        let config = CiteMigrateConfig::default();
        let err = config.api_key_with(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = CiteMigrateConfig::from_toml_str(
            r#"
            [library]
            api_key = "supersecretkey"
            "#,
        )
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("supersecretkey"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[conversion]\nverify = false\n").unwrap();
        let config = CiteMigrateConfig::load(&path).unwrap();
        assert!(!config.conversion.verify);

        let missing = CiteMigrateConfig::load(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
