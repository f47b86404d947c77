//! Research run configuration.

use agrisearch_core::config::STATE_DIR;
use agrisearch_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A specialization profile as written in `research.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializationProfile {
    pub name: String,
    /// Comma-separated focus keywords (weight 2)
    pub focus: String,
    /// Comma-separated expertise keywords (weight 1)
    pub expertise: String,
}

/// Replacement specialization registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializationSettings {
    /// Name of the profile used when no keyword matches
    pub default: String,
    pub profiles: Vec<SpecializationProfile>,
}

/// Unified configuration for one research run.
///
/// Every field has a serde default so a partial `research.yaml` is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Number of sub-queries requested from the expander
    #[serde(default = "default_num_sub_queries")]
    pub num_sub_queries: usize,

    /// Corpus results per sub-query
    #[serde(default = "default_k")]
    pub db_k: usize,

    /// Web results per sub-query
    #[serde(default = "default_k")]
    pub web_k: usize,

    #[serde(default = "default_true")]
    pub enable_db: bool,

    #[serde(default = "default_true")]
    pub enable_web: bool,

    /// Capacity tier name or model id; derived from `synthesis_model` when unset
    #[serde(default)]
    pub synthesis_capacity_hint: Option<String>,

    /// Evidence document ceiling in bytes before synthesis
    #[serde(default = "default_max_evidence_document_size")]
    pub max_evidence_document_size: usize,

    /// Retrieval worker pool size
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_db_timeout_secs")]
    pub db_timeout_secs: u64,

    #[serde(default = "default_web_timeout_secs")]
    pub web_timeout_secs: u64,

    /// Deadline for one whole sub-query task
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Deadline for each refine/expand call
    #[serde(default = "default_planning_timeout_secs")]
    pub planning_timeout_secs: u64,

    #[serde(default = "default_small_model")]
    pub refine_model: String,

    #[serde(default = "default_small_model")]
    pub expand_model: String,

    #[serde(default = "default_synthesis_model")]
    pub synthesis_model: String,

    /// "ollama" or "trigram"
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// JSONL corpus file, relative to the workspace unless absolute
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    /// SearxNG-compatible search endpoint
    #[serde(default)]
    pub web_search_url: Option<String>,

    /// Fetch full page text for web hits instead of using snippets
    #[serde(default = "default_true")]
    pub fetch_web_content: bool,

    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,

    /// Replaces the built-in agricultural registry when present
    #[serde(default)]
    pub specializations: Option<SpecializationSettings>,

    /// Directory for saved evidence documents
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    #[serde(default)]
    pub save_reports: bool,
}

fn default_num_sub_queries() -> usize {
    3
}

fn default_k() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_max_evidence_document_size() -> usize {
    48_000
}

fn default_max_workers() -> usize {
    5
}

fn default_db_timeout_secs() -> u64 {
    30
}

fn default_web_timeout_secs() -> u64 {
    45
}

fn default_task_timeout_secs() -> u64 {
    90
}

fn default_planning_timeout_secs() -> u64 {
    30
}

fn default_small_model() -> String {
    "gemma3:1b".to_string()
}

fn default_synthesis_model() -> String {
    "gemma3:27b".to_string()
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_max_page_chars() -> usize {
    2000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            num_sub_queries: default_num_sub_queries(),
            db_k: default_k(),
            web_k: default_k(),
            enable_db: true,
            enable_web: true,
            synthesis_capacity_hint: None,
            max_evidence_document_size: default_max_evidence_document_size(),
            max_workers: default_max_workers(),
            db_timeout_secs: default_db_timeout_secs(),
            web_timeout_secs: default_web_timeout_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            planning_timeout_secs: default_planning_timeout_secs(),
            refine_model: default_small_model(),
            expand_model: default_small_model(),
            synthesis_model: default_synthesis_model(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            corpus_path: None,
            web_search_url: None,
            fetch_web_content: true,
            max_page_chars: default_max_page_chars(),
            specializations: None,
            report_dir: None,
            save_reports: false,
        }
    }
}

impl ResearchConfig {
    /// Reject configurations that cannot produce a run.
    pub fn validate(&self) -> AppResult<()> {
        if !self.enable_db && !self.enable_web {
            return Err(AppError::Config(
                "At least one retrieval mode (database or web) must be enabled".to_string(),
            ));
        }

        if self.num_sub_queries == 0 {
            return Err(AppError::Config(
                "num_sub_queries must be at least 1".to_string(),
            ));
        }

        if self.max_workers == 0 {
            return Err(AppError::Config("max_workers must be at least 1".to_string()));
        }

        if let Some(settings) = &self.specializations {
            if settings.profiles.is_empty() {
                return Err(AppError::Config(
                    "specializations.profiles cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// The hint used to pick the synthesis capacity tier.
    pub fn capacity_hint(&self) -> &str {
        self.synthesis_capacity_hint
            .as_deref()
            .unwrap_or(&self.synthesis_model)
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    pub fn web_timeout(&self) -> Duration {
        Duration::from_secs(self.web_timeout_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn planning_timeout(&self) -> Duration {
        Duration::from_secs(self.planning_timeout_secs)
    }

    /// Resolve the corpus file against the workspace.
    pub fn resolved_corpus_path(&self, workspace: &Path) -> Option<PathBuf> {
        self.corpus_path.as_ref().map(|p| resolve(workspace, p))
    }

    /// Resolve the report directory, defaulting to `.agrisearch/reports`.
    pub fn resolved_report_dir(&self, workspace: &Path) -> PathBuf {
        match &self.report_dir {
            Some(dir) => resolve(workspace, dir),
            None => workspace.join(STATE_DIR).join("reports"),
        }
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// Path of the research configuration file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("research.yaml")
}

/// Load `.agrisearch/research.yaml`, or defaults when it does not exist.
pub fn load_research_config(workspace: &Path) -> AppResult<ResearchConfig> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("Using default research config (no config file found)");
        return Ok(ResearchConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: ResearchConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Loaded research config from {:?}", config_path);
    Ok(config)
}

/// Write the configuration to `.agrisearch/research.yaml`.
pub fn save_research_config(workspace: &Path, config: &ResearchConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml)?;

    tracing::debug!("Saved research config to {:?}", config_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_research_config(temp.path()).unwrap();

        assert_eq!(config.num_sub_queries, 3);
        assert_eq!(config.max_workers, 5);
        assert!(config.enable_db && config.enable_web);
        assert_eq!(config.capacity_hint(), "gemma3:27b");
        assert_eq!(config.max_evidence_document_size, 48_000);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "db_k: 5\nenable_web: false\nsynthesis_capacity_hint: large\n",
        )
        .unwrap();

        let config = load_research_config(temp.path()).unwrap();
        assert_eq!(config.db_k, 5);
        assert!(!config.enable_web);
        assert_eq!(config.web_k, 3);
        assert_eq!(config.capacity_hint(), "large");
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let config = ResearchConfig {
            num_sub_queries: 4,
            corpus_path: Some(PathBuf::from("corpus/agri.jsonl")),
            ..Default::default()
        };

        save_research_config(temp.path(), &config).unwrap();
        let loaded = load_research_config(temp.path()).unwrap();

        assert_eq!(loaded.num_sub_queries, 4);
        assert_eq!(
            loaded.resolved_corpus_path(temp.path()).unwrap(),
            temp.path().join("corpus/agri.jsonl")
        );
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "db_k: [not a number").unwrap();

        assert!(matches!(
            load_research_config(temp.path()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_validate_requires_a_mode() {
        let config = ResearchConfig {
            enable_db: false,
            enable_web: false,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        let config = ResearchConfig {
            num_sub_queries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ResearchConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(ResearchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_report_dir_default() {
        let config = ResearchConfig::default();
        assert_eq!(
            config.resolved_report_dir(Path::new("/ws")),
            PathBuf::from("/ws/.agrisearch/reports")
        );
    }
}
