//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::SwitchConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    ParseJson(serde_json::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::ParseJson(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(errors)
    }
}

/// Load configuration from a TOML or JSON file (chosen by extension).
///
/// Only syntax is checked here; environments are validated per run.
pub fn load_config(path: &Path) -> Result<SwitchConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content, is_json(path))
}

/// Parse configuration text.
pub fn parse_config(content: &str, json: bool) -> Result<SwitchConfig, ConfigError> {
    if json {
        serde_json::from_str(content).map_err(ConfigError::ParseJson)
    } else {
        toml::from_str(content).map_err(ConfigError::Parse)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("appgw.toml");
        fs::write(
            &toml_path,
            "[observability]\nlog_level = \"debug\"\n[environments.dev.gateway]\nname = \"agw-dev\"\n",
        )
        .unwrap();
        let config = load_config(&toml_path).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.environments["dev"].gateway.name, "agw-dev");

        let json_path = dir.path().join("appgw.JSON");
        fs::write(&json_path, r#"{ "environments": { "dev": { "redirectUrl": "https://m.example.com" } } }"#)
            .unwrap();
        let config = load_config(&json_path).unwrap();
        assert_eq!(
            config.environments["dev"].redirect_url.as_deref(),
            Some("https://m.example.com")
        );
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));

        let err = parse_config("environments = 3", false).unwrap_err();
        assert!(err.to_string().starts_with("Parse error"));
    }

    #[test]
    fn test_validation_display_lists_all() {
        let err = ConfigError::from(vec![
            ValidationError::UnknownEnvironment("a".into()),
            ValidationError::UnknownEnvironment("b".into()),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: unknown environment 'a', unknown environment 'b'"
        );
    }
}
