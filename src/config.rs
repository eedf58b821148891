use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub auth_url: Option<String>,
    pub auth_anon_key: Option<String>,
    pub translation: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub tag_suggestions: Vec<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some("ollama".to_string()),
            default_model: None,
            claude_api_key: None,
            openai_api_key: None,
            auth_url: None,
            auth_anon_key: None,
            translation: None,
            language: None,
            tag_suggestions: Vec::new(),
        }
    }

    pub fn load() -> Result<Self> {
        Self::read_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.write_to(&Self::config_path()?)
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    fn read_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("sermon-studio").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");

        let mut config = Config::new();
        config.default_model = Some("gemma3:latest".to_string());
        config.auth_url = Some("https://example.supabase.co/auth/v1".to_string());
        config.tag_suggestions = vec!["advent".to_string()];
        config.write_to(&path).expect("write");

        let loaded = Config::read_from(&path).expect("read");
        assert_eq!(loaded.default_model.as_deref(), Some("gemma3:latest"));
        assert_eq!(
            loaded.auth_url.as_deref(),
            Some("https://example.supabase.co/auth/v1")
        );
        assert_eq!(loaded.tag_suggestions, ["advent"]);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::read_from(&dir.path().join("absent.json")).expect("read");
        assert_eq!(config.provider.as_deref(), Some("ollama"));
        assert!(config.tag_suggestions.is_empty());
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        Config::new().write_to(&path).expect("write");
        assert!(path.exists());
    }
}
