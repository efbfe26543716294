use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use costgate_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let gate = &config.gate;
    let endpoint_url = config.aws.endpoint_url.as_deref().unwrap_or("<unset>");
    let entries = [
        (
            "gate.sns_topic_arn",
            gate.sns_topic_arn.clone(),
            source("gate.sns_topic_arn", &["COSTGATE_SNS_TOPIC_ARN", "SNSTopic"]),
        ),
        (
            "gate.pipeline_name",
            gate.pipeline_name.clone(),
            source("gate.pipeline_name", &["COSTGATE_PIPELINE_NAME", "PipelineName"]),
        ),
        (
            "gate.region",
            gate.region.clone(),
            source("gate.region", &["COSTGATE_REGION", "Region", "AWS_REGION"]),
        ),
        (
            "gate.review_stage",
            gate.review_stage.clone(),
            source("gate.review_stage", &["COSTGATE_REVIEW_STAGE"]),
        ),
        (
            "gate.review_action",
            gate.review_action.clone(),
            source("gate.review_action", &["COSTGATE_REVIEW_ACTION"]),
        ),
        (
            "gate.console_base_url",
            gate.console_base_url.clone(),
            source("gate.console_base_url", &["COSTGATE_CONSOLE_BASE_URL"]),
        ),
        (
            "thresholds.absolute",
            config.thresholds.absolute.to_string(),
            source("thresholds.absolute", &["COSTGATE_THRESHOLD_ABSOLUTE", "DiffAbsolute"]),
        ),
        (
            "thresholds.percent",
            config.thresholds.percent.to_string(),
            source("thresholds.percent", &["COSTGATE_THRESHOLD_PERCENT", "DiffPercent"]),
        ),
        (
            "aws.endpoint_url",
            endpoint_url.to_string(),
            source("aws.endpoint_url", &["COSTGATE_AWS_ENDPOINT_URL"]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["COSTGATE_LOGGING_LEVEL", "COSTGATE_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", &["COSTGATE_LOGGING_FORMAT", "COSTGATE_LOG_FORMAT"]),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.iter().map(|(key, value, source)| render_line(key, value, source)));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["costgate.toml", "config/costgate.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: &str) -> String {
    let value = if value.trim().is_empty() { "<empty>" } else { value };
    format!("- {key} = {value} (source: {source})")
}
