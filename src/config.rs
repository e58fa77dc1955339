use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::script::DEFAULT_MAX_STEPS;

const CONFIG_FILE: &str = "services.toml";

/// Service configuration, loaded from `services.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: String,
    /// Empty means the provider's default endpoint.
    pub api_url: String,
    pub default_model: String,
    /// 0 disables the completion request timeout.
    pub request_timeout_secs: u64,
    pub max_steps: u64,
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: "openai-compatible".to_string(),
            api_url: String::new(),
            default_model: "gpt-4-turbo".to_string(),
            request_timeout_secs: 0,
            max_steps: DEFAULT_MAX_STEPS,
            bind_addr: "0.0.0.0".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with the chain: `./services.toml` -> `~/services.toml` -> defaults.
    pub fn load() -> Self {
        for path in Self::config_paths() {
            if let Ok(contents) = fs::read_to_string(&path) {
                match toml::from_str::<AppConfig>(&contents) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        tracing::warn!("failed to parse {}: {}", path.display(), e);
                    }
                }
            }
        }
        Self::default()
    }

    /// Load an explicitly named file. Unlike [`AppConfig::load`], a missing
    /// or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE));
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.provider, "openai-compatible");
        assert!(cfg.api_url.is_empty());
        assert_eq!(cfg.default_model, "gpt-4-turbo");
        assert_eq!(cfg.request_timeout_secs, 0);
        assert_eq!(cfg.max_steps, 1_000_000);
        assert_eq!(cfg.bind_addr, "0.0.0.0");
    }

    #[test]
    fn test_partial_toml_deserialize() {
        let toml_str = r#"
            default_model = "custom-model"
            max_steps = 5000
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.default_model, "custom-model");
        assert_eq!(cfg.max_steps, 5000);
        // Other fields should be defaults
        assert_eq!(cfg.provider, "openai-compatible");
        assert_eq!(cfg.bind_addr, "0.0.0.0");
    }

    #[test]
    fn test_full_toml_deserialize() {
        let toml_str = r#"
            provider = "ollama"
            api_url = "http://localhost:11434/v1/chat/completions"
            default_model = "llama3"
            request_timeout_secs = 60
            max_steps = 100
            bind_addr = "127.0.0.1"
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.provider, "ollama");
        assert_eq!(cfg.api_url, "http://localhost:11434/v1/chat/completions");
        assert_eq!(cfg.default_model, "llama3");
        assert_eq!(cfg.request_timeout_secs, 60);
        assert_eq!(cfg.max_steps, 100);
        assert_eq!(cfg.bind_addr, "127.0.0.1");
    }

    #[test]
    fn test_load_from_reports_missing_file() {
        let err = AppConfig::load_from(Path::new("/nonexistent/services.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_from_reads_file() {
        let path = std::env::temp_dir().join(format!("services-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "default_model = \"from-file\"\n").unwrap();
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.default_model, "from-file");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let cfg = AppConfig::load();
        assert!(!cfg.default_model.is_empty());
    }
}
