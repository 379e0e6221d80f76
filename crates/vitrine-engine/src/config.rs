//! Migration configuration.
//!
//! Configuration can be loaded from:
//! - a TOML file (`$VITRINE_CONFIG`, default `./vitrine.toml`)
//! - environment variables (`VITRINE_*` prefixed)
//!
//! # Example
//!
//! ```rust,no_run
//! use vitrine_engine::config::MigrationConfig;
//!
//! // File if present, otherwise environment variables
//! let config = MigrationConfig::load().expect("Failed to load config");
//!
//! // Or from environment variables only
//! let config = MigrationConfig::from_env();
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use vitrine_core::defaults;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for vitrine_core::Error {
    fn from(e: ConfigError) -> Self {
        vitrine_core::Error::Config(e.to_string())
    }
}

/// Names, defaults and policies used by the migration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Tag name of the legacy inline construct.
    pub inline_tag: String,
    /// Tag name written for migrated inline constructs.
    pub canonical_tag: String,
    /// Block name of the legacy gallery node.
    pub legacy_gallery_block: String,
    /// Block name of image children inside a legacy gallery.
    pub image_block: String,
    /// Block name written for migrated gallery nodes.
    pub canonical_block: String,
    /// Scope keywords that are never offered for conversion.
    pub scope_denylist: Vec<String>,
    /// Edit location template; `{id}` is replaced with the document id.
    pub edit_url_template: String,
    pub default_columns: u32,
    pub default_size_slug: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            inline_tag: defaults::INLINE_TAG.to_string(),
            canonical_tag: defaults::CANONICAL_TAG.to_string(),
            legacy_gallery_block: defaults::LEGACY_GALLERY_BLOCK.to_string(),
            image_block: defaults::IMAGE_BLOCK.to_string(),
            canonical_block: defaults::CANONICAL_BLOCK.to_string(),
            scope_denylist: defaults::SCOPE_DENYLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            edit_url_template: defaults::EDIT_URL_TEMPLATE.to_string(),
            default_columns: defaults::COLUMNS,
            default_size_slug: defaults::SIZE_SLUG.to_string(),
        }
    }
}

impl MigrationConfig {
    /// Default config file path: `$VITRINE_CONFIG` or `./vitrine.toml`.
    pub fn default_config_path() -> PathBuf {
        env::var("VITRINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("vitrine.toml"))
    }

    /// Load from the default file path, falling back to environment variables.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::default_config_path();

        if path.exists() {
            info!("Loading migration config from: {}", path.display());
            Self::from_file(&path)
        } else {
            debug!(
                "Config file not found at {}, using environment variables",
                path.display()
            );
            let config = Self::from_env();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from a TOML file with a `[migration]` table.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text with a `[migration]` table.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        #[derive(Deserialize)]
        struct TomlRoot {
            #[serde(default)]
            migration: MigrationConfig,
        }

        let root: TomlRoot = toml::from_str(content)?;
        root.migration.validate()?;
        Ok(root.migration)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let base = Self::default();
        let var = |key: &str, fallback: String| env::var(key).unwrap_or(fallback);

        Self {
            inline_tag: var("VITRINE_INLINE_TAG", base.inline_tag),
            canonical_tag: var("VITRINE_CANONICAL_TAG", base.canonical_tag),
            legacy_gallery_block: var("VITRINE_LEGACY_GALLERY_BLOCK", base.legacy_gallery_block),
            image_block: var("VITRINE_IMAGE_BLOCK", base.image_block),
            canonical_block: var("VITRINE_CANONICAL_BLOCK", base.canonical_block),
            scope_denylist: env::var("VITRINE_SCOPE_DENYLIST")
                .map(|s| {
                    s.split(',')
                        .map(|k| k.trim().to_lowercase())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or(base.scope_denylist),
            edit_url_template: var("VITRINE_EDIT_URL_TEMPLATE", base.edit_url_template),
            default_columns: env::var("VITRINE_DEFAULT_COLUMNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.default_columns),
            default_size_slug: var("VITRINE_DEFAULT_SIZE_SLUG", base.default_size_slug),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let names = [
            ("inline_tag", &self.inline_tag),
            ("canonical_tag", &self.canonical_tag),
            ("legacy_gallery_block", &self.legacy_gallery_block),
            ("image_block", &self.image_block),
            ("canonical_block", &self.canonical_block),
            ("default_size_slug", &self.default_size_slug),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
            }
        }

        if self.inline_tag == self.canonical_tag {
            return Err(ConfigError::Validation(
                "inline_tag and canonical_tag must differ".to_string(),
            ));
        }

        if self.legacy_gallery_block == self.canonical_block {
            return Err(ConfigError::Validation(
                "legacy_gallery_block and canonical_block must differ".to_string(),
            ));
        }

        if !self.edit_url_template.contains("{id}") {
            return Err(ConfigError::Validation(format!(
                "edit_url_template must contain {{id}}, got: {}",
                self.edit_url_template
            )));
        }

        if self.default_columns == 0 {
            return Err(ConfigError::Validation(
                "default_columns must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Edit location for a document.
    pub fn edit_url(&self, document_id: i64) -> String {
        self.edit_url_template
            .replace("{id}", &document_id.to_string())
    }
}
