use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub base_path: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    MissingPort,
    InvalidPort(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingPort => f.write_str("TASKBOARD_PORT must be set"),
            ConfigError::InvalidPort(value) => write!(f, "TASKBOARD_PORT is not a port: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("TASKBOARD_PORT").ok_or(ConfigError::MissingPort)?;
        let port = port
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;

        let db_path = lookup("TASKBOARD_DB_PATH")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("tasks.db"));

        let base_path = lookup("TASKBOARD_BASE_PATH")
            .map(|path| normalize_base_path(&path))
            .unwrap_or_default();

        Ok(Config {
            port,
            db_path,
            base_path,
        })
    }
}

fn normalize_base_path(path: &str) -> String {
    let path = path.trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("TASKBOARD_PORT", "5000")]).unwrap();
        assert_eq!(
            config,
            Config {
                port: 5000,
                db_path: PathBuf::from("tasks.db"),
                base_path: String::new(),
            }
        );
    }

    #[test]
    fn port_is_required_and_numeric() {
        assert_eq!(config(&[]), Err(ConfigError::MissingPort));
        assert_eq!(
            config(&[("TASKBOARD_PORT", "http")]),
            Err(ConfigError::InvalidPort("http".to_string()))
        );
    }

    #[test]
    fn base_path_is_normalized() {
        for (raw, expected) in [("tasks/", "/tasks"), ("/tasks", "/tasks"), ("/", ""), ("", "")] {
            let config = config(&[("TASKBOARD_PORT", "1"), ("TASKBOARD_BASE_PATH", raw)]).unwrap();
            assert_eq!(config.base_path, expected, "raw {raw:?}");
        }
    }
}
