use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// File offered as the drag payload. `~` is expanded.
    #[serde(default = "default_source_file")]
    pub source_file: String,
    #[serde(default = "default_label_text")]
    pub label_text: String,
}

fn default_source_file() -> String { "~/Pictures/Screenshots/20260213_193932.png".to_string() }
fn default_label_text() -> String { "DRAG ME".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            source_file: default_source_file(),
            label_text: default_label_text(),
        }
    }
}

impl Config {
    pub fn source_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.source_file).as_ref())
    }
}

pub fn load_config() -> Config {
    let home = match std::env::var("HOME") {
        Ok(h) => h,
        Err(_) => {
            warn!("HOME env var not set, using default config");
            return Config::default();
        }
    };

    let config_path = PathBuf::from(home).join(".config/test-drag/config.toml");
    load_config_from(&config_path)
}

pub fn load_config_from(config_path: &Path) -> Config {
    let config_str = match fs::read_to_string(config_path) {
        Ok(s) => s,
        Err(_) => {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&config_str) {
        Ok(config) => {
            tracing::info!("Loaded config from {}", config_path.display());
            config
        }
        Err(e) => {
            warn!("Failed to parse config: {}, using defaults", e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml"));
        assert_eq!(config.source_file, default_source_file());
        assert_eq!(config.label_text, "DRAG ME");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source_file = \"/srv/shots/a.png\"").unwrap();

        let config = load_config_from(file.path());
        assert_eq!(config.source_path(), PathBuf::from("/srv/shots/a.png"));
        assert_eq!(config.label_text, "DRAG ME");
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source_file = [1, 2").unwrap();

        let config = load_config_from(file.path());
        assert_eq!(config.source_file, default_source_file());
    }

    #[test]
    fn test_tilde_is_expanded() {
        let path = Config::default().source_path();
        assert!(!path.starts_with("~"));
        assert!(path.ends_with("Pictures/Screenshots/20260213_193932.png"));
    }
}
