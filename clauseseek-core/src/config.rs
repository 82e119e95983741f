//! Configuration system for clauseseek.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from the user config directory (`config.toml`) and/or
//! `.clauseseek/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::clauses::ClauseOntology;
use crate::embeddings::EmbeddingConfig;
use crate::error::ConfigError;
use crate::generator::GeneratorConfig;

/// Workspace directory holding the workspace-level config file.
pub const WORKSPACE_CONFIG_DIR: &str = ".clauseseek";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClauseseekConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub clauses: ClausesConfig,
}

/// Where the persisted index lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index directory. Relative paths resolve against the workspace.
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    /// Directory of pre-extracted `<stem>.txt` files used when a document
    /// cannot be read directly. Defaults to the document's own directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar_dir: Option<PathBuf>,
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("data/index")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            sidecar_dir: None,
        }
    }
}

/// Default candidate and result counts for queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidate pool size for `ask`.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Chunks kept for answer composition in `ask`.
    #[serde(default = "default_return_k")]
    pub return_k: usize,
    /// Result count for `search`.
    #[serde(default = "default_search_k")]
    pub search_k: usize,
    /// Shorter questions (after trimming) are rejected.
    #[serde(default = "default_min_question_chars")]
    pub min_question_chars: usize,
}

fn default_top_k() -> usize {
    12
}

fn default_return_k() -> usize {
    5
}

fn default_search_k() -> usize {
    5
}

fn default_min_question_chars() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            return_k: default_return_k(),
            search_k: default_search_k(),
            min_question_chars: default_min_question_chars(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4050
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Clause ontology source. Without a file the built-in contract ontology is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClausesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology_file: Option<PathBuf>,
}

impl ClausesConfig {
    pub fn ontology(&self) -> Result<ClauseOntology, ConfigError> {
        match &self.ontology_file {
            Some(path) => ClauseOntology::from_json_file(path),
            None => Ok(ClauseOntology::default()),
        }
    }
}

impl ClauseseekConfig {
    /// Reject settings that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be positive");
        }
        if self.retrieval.return_k == 0 {
            return invalid("retrieval.return_k must be positive");
        }
        if self.retrieval.search_k == 0 {
            return invalid("retrieval.search_k must be positive");
        }
        if !["local", "openai", "ollama"].contains(&self.embedding.provider.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!("unknown embedding provider '{}'", self.embedding.provider),
            });
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be positive");
        }
        if self.generator.max_context_chars == 0 {
            return invalid("generator.max_context_chars must be positive");
        }
        Ok(())
    }

    /// Index directory, resolved against `workspace` when relative.
    pub fn index_dir(&self, workspace: &Path) -> PathBuf {
        if self.index.dir.is_absolute() {
            self.index.dir.clone()
        } else {
            workspace.join(&self.index.dir)
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `CLAUSESEEK_`)
/// 3. Workspace-local config (`.clauseseek/config.toml`)
/// 4. User config (`<config dir>/clauseseek/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ClauseseekConfig>,
) -> Result<ClauseseekConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ClauseseekConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_CONFIG_DIR).join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // CLAUSESEEK_RETRIEVAL__TOP_K, CLAUSESEEK_EMBEDDING__PROVIDER, etc.
    figment = figment.merge(Env::prefixed("CLAUSESEEK_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load from an explicit TOML file layered over the defaults, then the
/// environment.
pub fn load_config_file(path: &Path) -> Result<ClauseseekConfig, Box<figment::Error>> {
    Figment::from(Serialized::defaults(ClauseseekConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CLAUSESEEK_").split("__"))
        .extract()
        .map_err(Box::new)
}

/// `config.toml` in the platform user config directory.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "clauseseek", "clauseseek")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Write the default configuration to `<workspace>/.clauseseek/config.toml`
/// unless a file is already there. Returns the path.
pub fn write_default_config(workspace: &Path) -> anyhow::Result<PathBuf> {
    let config_dir = workspace.join(WORKSPACE_CONFIG_DIR);
    std::fs::create_dir_all(&config_dir)?;
    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }
    let toml_str = toml::to_string_pretty(&ClauseseekConfig::default())?;
    std::fs::write(&config_path, toml_str)?;
    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClauseseekConfig::default();
        assert_eq!(config.chunking.size, 800);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.index.dir, PathBuf::from("data/index"));
        assert_eq!(config.embedding.provider, "local");
        assert!(!config.generator.enabled);
        assert_eq!(config.retrieval.top_k, 12);
        assert_eq!(config.retrieval.return_k, 5);
        assert_eq!(config.retrieval.min_question_chars, 3);
        assert_eq!(config.server.port, 4050);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = ClauseseekConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ClauseseekConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ClauseseekConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.retrieval.top_k, 12);
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.chunking.size, 800);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = ClauseseekConfig::default();
        overrides.retrieval.return_k = 3;
        overrides.server.port = 8080;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.retrieval.return_k, 3);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(WORKSPACE_CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[chunking]
size = 1200
overlap = 150

[embedding]
provider = "local"
dimensions = 256

[retrieval]
top_k = 20
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.chunking.size, 1200);
        assert_eq!(config.chunking.overlap, 150);
        assert_eq!(config.embedding.dimensions, 256);
        assert_eq!(config.retrieval.top_k, 20);
        assert_eq!(config.retrieval.return_k, 5);
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[index]\ndir = \"/srv/index\"\n").unwrap();
        let config = load_config_file(&path).unwrap();
        assert_eq!(config.index.dir, PathBuf::from("/srv/index"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClauseseekConfig::default();
        config.chunking.overlap = 800;
        assert!(config.validate().is_err());

        let mut config = ClauseseekConfig::default();
        config.retrieval.return_k = 0;
        assert!(config.validate().is_err());

        let mut config = ClauseseekConfig::default();
        config.embedding.provider = "word2vec".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_index_dir_resolution() {
        let config = ClauseseekConfig::default();
        assert_eq!(
            config.index_dir(Path::new("/work")),
            PathBuf::from("/work/data/index")
        );
    }

    #[test]
    fn test_write_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_default_config(dir.path()).unwrap();
        let loaded = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(loaded.chunking, ChunkingConfig::default());
        assert!(write_default_config(dir.path()).is_err());
        assert!(path.ends_with(".clauseseek/config.toml"));
    }

    #[test]
    fn test_clauses_ontology_default() {
        let ontology = ClausesConfig::default().ontology().unwrap();
        assert_eq!(ontology, ClauseOntology::default());
    }
}
