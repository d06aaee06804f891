//! Configuration file loading (structgen.json).
//!
//! One optional file supplying what the CLI flags do not: the directory
//! instruction scripts are looked up in, and the default commit mode.
//! CLI arguments take precedence.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The config file name searched for in the working directory.
pub const CONFIG_FILE_NAME: &str = "structgen.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory relative script paths are resolved against.
    pub default_script_dir: Option<PathBuf>,

    /// Roll back structures created by failing lines.
    pub atomic_lines: bool,
}

impl Config {
    /// Load from an explicit path (must exist), or from
    /// `structgen.json` in the working directory when present, or fall
    /// back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let implied = PathBuf::from(CONFIG_FILE_NAME);
                if !implied.exists() {
                    return Ok(Config::default());
                }
                implied
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolve a script path: relative paths that do not exist locally are
    /// retried under the configured default directory.
    pub fn resolve_script(&self, script: &Path) -> PathBuf {
        if script.is_relative() && !script.exists() {
            if let Some(dir) = &self.default_script_dir {
                return dir.join(script);
            }
        }
        script.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn explicit_missing_config_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/structgen.json"))).is_err());
    }

    #[test]
    fn config_parses_known_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"default_script_dir":"/srv/templates","atomic_lines":true}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(
            config.default_script_dir,
            Some(PathBuf::from("/srv/templates"))
        );
        assert!(config.atomic_lines);
    }

    #[test]
    fn relative_scripts_resolve_against_the_default_dir() {
        let config = Config {
            default_script_dir: Some(PathBuf::from("/srv/templates")),
            atomic_lines: false,
        };
        assert_eq!(
            config.resolve_script(Path::new("prostate.txt")),
            PathBuf::from("/srv/templates/prostate.txt")
        );
        // Absolute paths are left alone.
        assert_eq!(
            config.resolve_script(Path::new("/tmp/x.txt")),
            PathBuf::from("/tmp/x.txt")
        );
    }
}
