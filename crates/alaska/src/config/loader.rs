use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ALASKA_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads the config file named by `ALASKA_CONFIG`.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    let path = std::env::var_os(CONFIG_ENV).ok_or(ConfigError::MissingEnv(CONFIG_ENV))?;
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    let mut codes = HashSet::new();
    let mut steps = HashSet::new();
    for analysis in &config.analyses {
        if !codes.insert(analysis.code.as_str()) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate analysis code '{}'", analysis.code),
            });
        }
        // Two active analyses on one step would make the job order ambiguous.
        if analysis.active && !steps.insert(analysis.step) {
            return Err(ConfigError::Validation {
                message: format!(
                    "Analysis '{}' shares step {} with another active analysis",
                    analysis.code, analysis.step
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use serial_test::serial;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/alaska/alaska.db",
            "worker_count": 2,
            "progress": { "finalized": 3, "started": { "quant": 5, "diff": 8 } },
            "notifications": { "spool_directory": "/var/spool/alaska" },
            "logging": { "format": "json" },
            "analyses": [
                { "code": "qc", "name": "Quality control", "step": 0 },
                { "code": "quant", "name": "Quantification", "step": 1 },
                { "code": "diff", "name": "Differential expression", "step": 2, "active": false }
            ]
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.worker_interval_secs, 5);
        assert_eq!(config.progress.finalized, 3);
        assert_eq!(config.progress.started_for("quant"), Some(5));
        assert_eq!(config.progress.started_for("qc"), None);
        assert_eq!(config.notifications.from, "noreply@alaska.local");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.analyses.len(), 3);
        assert!(!config.analyses[2].active);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert!(config.worker_count >= 1);
        assert_eq!(config.progress.finalized, 0);
        assert!(config.notifications.spool_directory.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_schema_rejects_unknown_fields() {
        let result = load_config_from_str(r#"{ "version": "1.0", "workers": 3 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_non_integer_started_progress() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "progress": { "started": { "qc": "early" } } }"#,
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_schema_rejects_bad_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_duplicate_analysis_code() {
        let config_json = r#"
        {
            "version": "1.0",
            "analyses": [
                { "code": "qc", "name": "QC", "step": 0 },
                { "code": "qc", "name": "QC again", "step": 1 }
            ]
        }
        "#;
        let err = load_config_from_str(config_json).unwrap_err();
        assert!(err.to_string().contains("Duplicate analysis code 'qc'"));
    }

    #[test]
    fn test_active_analyses_share_step() {
        let config_json = r#"
        {
            "version": "1.0",
            "analyses": [
                { "code": "qc", "name": "QC", "step": 0 },
                { "code": "trim", "name": "Trimming", "step": 0 }
            ]
        }
        "#;
        assert!(matches!(
            load_config_from_str(config_json),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alaska.json");
        std::fs::write(&path, r#"{ "version": "1.0", "worker_count": 1 }"#).unwrap();

        std::env::set_var(CONFIG_ENV, &path);
        let config = load_config_from_env().unwrap();
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(config.worker_count, 1);
    }

    #[test]
    #[serial]
    fn test_load_from_env_missing() {
        std::env::remove_var(CONFIG_ENV);
        assert!(matches!(
            load_config_from_env(),
            Err(ConfigError::MissingEnv(CONFIG_ENV))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/alaska.json"),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
