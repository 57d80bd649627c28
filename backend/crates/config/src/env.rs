use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use triage_common::error::{TriageError, TriageResult};

const DEFAULT_GRADER_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GRADER_MODEL: &str = "gemini-2.5-flash";

/// Connection settings for the external conversation grader.
#[derive(Debug, Clone, Deserialize)]
pub struct GraderSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub classifier_config: Option<PathBuf>,
    pub skip_model_grading: bool,
    pub sample_size: usize,
    pub grader: Option<GraderSettings>,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> TriageResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let grader = match env::var("GRADER_API_KEY").ok().filter(|k| !k.trim().is_empty()) {
            Some(api_key) => Some(GraderSettings {
                api_key,
                base_url: get_var_or("GRADER_BASE_URL", DEFAULT_GRADER_BASE_URL),
                model: get_var_or("GRADER_MODEL", DEFAULT_GRADER_MODEL),
            }),
            None => None,
        };

        Ok(Self {
            input_path: PathBuf::from(get_var("INPUT_PATH")?),
            output_dir: PathBuf::from(get_var_or("OUTPUT_DIR", "output/data")),
            classifier_config: env::var("CLASSIFIER_CONFIG").ok().map(PathBuf::from),
            skip_model_grading: parse_bool("SKIP_MODEL_GRADING", false)?,
            sample_size: get_var_or("SAMPLE_SIZE", "500")
                .parse()
                .map_err(|e| TriageError::Config(format!("invalid SAMPLE_SIZE: {e}")))?,
            grader,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }

    /// Whether this run should submit conversations to the external grader.
    pub fn grading_requested(&self) -> bool {
        !self.skip_model_grading && self.grader.is_some()
    }
}

fn get_var(key: &str) -> TriageResult<String> {
    env::var(key).map_err(|_| TriageError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_bool(key: &str, default: bool) -> TriageResult<bool> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(TriageError::Config(format!("invalid {key}: {other}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_vars() {
        for key in [
            "INPUT_PATH",
            "OUTPUT_DIR",
            "CLASSIFIER_CONFIG",
            "SKIP_MODEL_GRADING",
            "SAMPLE_SIZE",
            "GRADER_API_KEY",
            "GRADER_BASE_URL",
            "GRADER_MODEL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn config_from_env_succeeds_with_required_vars() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_vars();

        env::set_var("INPUT_PATH", "output/cache/extracted_data.json");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(
            cfg.input_path,
            PathBuf::from("output/cache/extracted_data.json")
        );
        assert_eq!(cfg.output_dir, PathBuf::from("output/data"));
        assert_eq!(cfg.sample_size, 500);
        assert!(!cfg.skip_model_grading);
        assert!(cfg.grader.is_none());
        assert!(!cfg.grading_requested());

        clear_vars();
    }

    #[test]
    fn config_from_env_fails_without_input_path() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_vars();

        let result = AppConfig::from_env();
        assert!(matches!(result, Err(TriageError::Config(_))));
    }

    #[test]
    fn grader_settings_use_defaults() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_vars();

        env::set_var("INPUT_PATH", "in.json");
        env::set_var("GRADER_API_KEY", "secret");

        let cfg = AppConfig::from_env().expect("should parse config");
        let grader = cfg.grader.clone().expect("grader configured");
        assert_eq!(grader.base_url, DEFAULT_GRADER_BASE_URL);
        assert_eq!(grader.model, DEFAULT_GRADER_MODEL);
        assert!(cfg.grading_requested());

        clear_vars();
    }

    #[test]
    fn skip_flag_disables_grading() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_vars();

        env::set_var("INPUT_PATH", "in.json");
        env::set_var("GRADER_API_KEY", "secret");
        env::set_var("SKIP_MODEL_GRADING", "true");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert!(cfg.skip_model_grading);
        assert!(!cfg.grading_requested());

        clear_vars();
    }

    #[test]
    fn invalid_bool_is_config_error() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_vars();

        env::set_var("INPUT_PATH", "in.json");
        env::set_var("SKIP_MODEL_GRADING", "maybe");

        assert!(matches!(AppConfig::from_env(), Err(TriageError::Config(_))));

        clear_vars();
    }
}
