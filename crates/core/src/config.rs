use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::event::parse_amount;
use crate::domain::thresholds::Thresholds;

pub const DEFAULT_REVIEW_STAGE: &str = "ReviewPlan";
pub const DEFAULT_REVIEW_ACTION: &str = "review-plan";
pub const DEFAULT_CONSOLE_BASE_URL: &str = "https://console.aws.amazon.com";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gate: GateConfig,
    pub thresholds: Thresholds,
    pub aws: AwsConfig,
    pub logging: LoggingConfig,
}

/// Where notifications go and which pipeline review action the gate drives.
#[derive(Clone, Debug)]
pub struct GateConfig {
    pub sns_topic_arn: String,
    pub pipeline_name: String,
    pub region: String,
    pub review_stage: String,
    pub review_action: String,
    pub console_base_url: String,
}

#[derive(Clone, Debug, Default)]
pub struct AwsConfig {
    pub endpoint_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub sns_topic_arn: Option<String>,
    pub pipeline_name: Option<String>,
    pub region: Option<String>,
    pub threshold_absolute: Option<Decimal>,
    pub threshold_percent: Option<Decimal>,
    pub aws_endpoint_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig {
                sns_topic_arn: String::new(),
                pipeline_name: String::new(),
                region: String::new(),
                review_stage: DEFAULT_REVIEW_STAGE.to_string(),
                review_action: DEFAULT_REVIEW_ACTION.to_string(),
                console_base_url: DEFAULT_CONSOLE_BASE_URL.to_string(),
            },
            thresholds: Thresholds::default(),
            aws: AwsConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("costgate.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(gate) = patch.gate {
            if let Some(sns_topic_arn) = gate.sns_topic_arn {
                self.gate.sns_topic_arn = sns_topic_arn;
            }
            if let Some(pipeline_name) = gate.pipeline_name {
                self.gate.pipeline_name = pipeline_name;
            }
            if let Some(region) = gate.region {
                self.gate.region = region;
            }
            if let Some(review_stage) = gate.review_stage {
                self.gate.review_stage = review_stage;
            }
            if let Some(review_action) = gate.review_action {
                self.gate.review_action = review_action;
            }
            if let Some(console_base_url) = gate.console_base_url {
                self.gate.console_base_url = console_base_url;
            }
        }

        if let Some(thresholds) = patch.thresholds {
            if let Some(absolute) = thresholds.absolute {
                self.thresholds.absolute = absolute;
            }
            if let Some(percent) = thresholds.percent {
                self.thresholds.percent = percent;
            }
        }

        if let Some(aws) = patch.aws {
            if let Some(endpoint_url) = aws.endpoint_url {
                self.aws.endpoint_url = Some(endpoint_url);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    /// `COSTGATE_*` names win over the stack-parameter names the function was
    /// originally deployed with (`SNSTopic`, `DiffAbsolute`, ...).
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_any(&["COSTGATE_SNS_TOPIC_ARN", "SNSTopic"]) {
            self.gate.sns_topic_arn = value;
        }
        if let Some(value) = read_env_any(&["COSTGATE_PIPELINE_NAME", "PipelineName"]) {
            self.gate.pipeline_name = value;
        }
        if let Some(value) = read_env_any(&["COSTGATE_REGION", "Region", "AWS_REGION"]) {
            self.gate.region = value;
        }
        if let Some(value) = read_env("COSTGATE_REVIEW_STAGE") {
            self.gate.review_stage = value;
        }
        if let Some(value) = read_env("COSTGATE_REVIEW_ACTION") {
            self.gate.review_action = value;
        }
        if let Some(value) = read_env("COSTGATE_CONSOLE_BASE_URL") {
            self.gate.console_base_url = value;
        }

        for key in ["COSTGATE_THRESHOLD_ABSOLUTE", "DiffAbsolute"] {
            if let Some(value) = read_env(key) {
                self.thresholds.absolute = parse_decimal(key, &value)?;
                break;
            }
        }
        for key in ["COSTGATE_THRESHOLD_PERCENT", "DiffPercent"] {
            if let Some(value) = read_env(key) {
                self.thresholds.percent = parse_decimal(key, &value)?;
                break;
            }
        }

        if let Some(value) = read_env("COSTGATE_AWS_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(value);
        }

        if let Some(value) = read_env_any(&["COSTGATE_LOGGING_LEVEL", "COSTGATE_LOG_LEVEL"]) {
            self.logging.level = value;
        }
        if let Some(value) = read_env_any(&["COSTGATE_LOGGING_FORMAT", "COSTGATE_LOG_FORMAT"]) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(sns_topic_arn) = overrides.sns_topic_arn {
            self.gate.sns_topic_arn = sns_topic_arn;
        }
        if let Some(pipeline_name) = overrides.pipeline_name {
            self.gate.pipeline_name = pipeline_name;
        }
        if let Some(region) = overrides.region {
            self.gate.region = region;
        }
        if let Some(absolute) = overrides.threshold_absolute {
            self.thresholds.absolute = absolute;
        }
        if let Some(percent) = overrides.threshold_percent {
            self.thresholds.percent = percent;
        }
        if let Some(endpoint_url) = overrides.aws_endpoint_url {
            self.aws.endpoint_url = Some(endpoint_url);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gate(&self.gate)?;
        validate_thresholds(&self.thresholds)?;
        validate_aws(&self.aws)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("costgate.toml"), PathBuf::from("config/costgate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_gate(gate: &GateConfig) -> Result<(), ConfigError> {
    let topic = gate.sns_topic_arn.trim();
    if topic.is_empty() {
        return Err(ConfigError::Validation(
            "gate.sns_topic_arn is required (env `COSTGATE_SNS_TOPIC_ARN` or `SNSTopic`)"
                .to_string(),
        ));
    }
    if !topic.starts_with("arn:") {
        return Err(ConfigError::Validation(format!(
            "gate.sns_topic_arn must be a topic ARN (`arn:aws:sns:<region>:<account>:<name>`), got `{topic}`"
        )));
    }

    if gate.pipeline_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "gate.pipeline_name is required (env `COSTGATE_PIPELINE_NAME` or `PipelineName`)"
                .to_string(),
        ));
    }

    if gate.region.trim().is_empty() {
        return Err(ConfigError::Validation(
            "gate.region is required (env `COSTGATE_REGION`, `Region` or `AWS_REGION`)"
                .to_string(),
        ));
    }

    if gate.review_stage.trim().is_empty() || gate.review_action.trim().is_empty() {
        return Err(ConfigError::Validation(
            "gate.review_stage and gate.review_action must not be empty".to_string(),
        ));
    }

    if !is_http_url(&gate.console_base_url) {
        return Err(ConfigError::Validation(
            "gate.console_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_thresholds(thresholds: &Thresholds) -> Result<(), ConfigError> {
    if thresholds.absolute < Decimal::ZERO {
        return Err(ConfigError::Validation(
            "thresholds.absolute must be greater than or equal to zero".to_string(),
        ));
    }

    if thresholds.percent < Decimal::ZERO || thresholds.percent > Decimal::ONE_HUNDRED {
        return Err(ConfigError::Validation(
            "thresholds.percent must be in range 0..=100".to_string(),
        ));
    }

    Ok(())
}

fn validate_aws(aws: &AwsConfig) -> Result<(), ConfigError> {
    if let Some(endpoint_url) = &aws.endpoint_url {
        if !is_http_url(endpoint_url) {
            return Err(ConfigError::Validation(
                "aws.endpoint_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    parse_amount(value).ok_or_else(|| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    gate: Option<GatePatch>,
    thresholds: Option<ThresholdsPatch>,
    aws: Option<AwsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct GatePatch {
    sns_topic_arn: Option<String>,
    pipeline_name: Option<String>,
    region: Option<String>,
    review_stage: Option<String>,
    review_action: Option<String>,
    console_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ThresholdsPatch {
    absolute: Option<Decimal>,
    percent: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct AwsPatch {
    endpoint_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
