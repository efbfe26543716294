use costgate_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use costgate_core::domain::decision::ThresholdDecision;
use costgate_core::domain::event::{parse_amount, CostFigures};
use costgate_core::gate::planned_action;
use costgate_core::policy::{self, change_percent};
use rust_decimal::Decimal;
use serde_json::json;

use crate::commands::{CommandResult, EXIT_INVALID_INPUT};

const COMMAND: &str = "evaluate";

#[derive(Clone, Debug, Default)]
pub struct EvaluateArgs {
    pub total: String,
    pub past: String,
    pub diff: String,
    pub absolute: Option<String>,
    pub percent: Option<String>,
}

pub fn run(args: EvaluateArgs) -> CommandResult {
    let figures = match parse_figures(&args) {
        Ok(figures) => figures,
        Err(message) => {
            return CommandResult::failure(COMMAND, "invalid_input", message, EXIT_INVALID_INPUT)
        }
    };

    let overrides = match threshold_overrides(&args) {
        Ok(overrides) => overrides,
        Err(message) => {
            return CommandResult::failure(COMMAND, "invalid_input", message, EXIT_INVALID_INPUT)
        }
    };

    let config = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_INVALID_INPUT,
            )
        }
    };

    let thresholds = &config.thresholds;
    let decision = policy::evaluate(figures.diff, figures.past, figures.total, thresholds);
    let action = planned_action(&config, decision, &figures);

    let message = match decision {
        ThresholdDecision::Notify(breach) => format!("{breach} threshold exceeded; review required"),
        ThresholdDecision::AutoApprove => "within thresholds; eligible for auto-approval".to_string(),
    };

    let details = json!({
        "figures": figures,
        "thresholds": thresholds,
        "change_percent": change_percent(figures.diff, figures.past, figures.total)
            .map(|percent| percent.round_dp(4)),
        "decision": decision,
        "action": action,
    });

    CommandResult::success_with_details(COMMAND, message, Some(details))
}

fn parse_figures(args: &EvaluateArgs) -> Result<CostFigures, String> {
    Ok(CostFigures {
        total: parse_flag("--total", &args.total)?,
        past: parse_flag("--past", &args.past)?,
        diff: parse_flag("--diff", &args.diff)?,
    })
}

fn threshold_overrides(args: &EvaluateArgs) -> Result<ConfigOverrides, String> {
    Ok(ConfigOverrides {
        threshold_absolute: args
            .absolute
            .as_deref()
            .map(|value| parse_flag("--absolute", value))
            .transpose()?,
        threshold_percent: args
            .percent
            .as_deref()
            .map(|value| parse_flag("--percent", value))
            .transpose()?,
        ..ConfigOverrides::default()
    })
}

fn parse_flag(flag: &str, value: &str) -> Result<Decimal, String> {
    parse_amount(value).ok_or_else(|| format!("{flag} must be a finite number, got `{value}`"))
}
