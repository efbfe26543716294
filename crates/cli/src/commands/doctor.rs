use costgate_aws::{load_sdk_config, CodePipelineController};
use costgate_core::approval::PipelineController;
use costgate_core::config::{AppConfig, LoadOptions};
use costgate_core::domain::review::ReviewStatus;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_thresholds(&config));
            checks.push(check_review_stage(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck::skipped("threshold_policy"));
            checks.push(DoctorCheck::skipped("pipeline_review_stage"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_thresholds(config: &AppConfig) -> DoctorCheck {
    let thresholds = &config.thresholds;
    let details = if thresholds.absolute.is_zero() && thresholds.percent.is_zero() {
        "both thresholds are 0; every non-zero cost change will be sent for review".to_string()
    } else if thresholds.percent == Decimal::ONE_HUNDRED {
        format!(
            "percent threshold is 100%; only changes above {}$ absolute will be sent for review",
            thresholds.absolute
        )
    } else {
        format!("absolute {}$, percent {}%", thresholds.absolute, thresholds.percent)
    };

    DoctorCheck { name: "threshold_policy", status: CheckStatus::Pass, details }
}

fn check_review_stage(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "pipeline_review_stage",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let gate = &config.gate;
    let result = runtime.block_on(async {
        let sdk_config = load_sdk_config(config).await;
        CodePipelineController::new(&sdk_config)
            .review_state(&gate.pipeline_name, &gate.review_stage)
            .await
    });

    let (status, details) = match result {
        Ok(Some(state)) => {
            let pending = if state.status == ReviewStatus::InProgress && state.token.is_some() {
                "; an approval is pending"
            } else {
                ""
            };
            (
                CheckStatus::Pass,
                format!(
                    "stage `{}` action `{}` is in {} status{pending}",
                    state.stage_name, state.action_name, state.status
                ),
            )
        }
        Ok(None) => (
            CheckStatus::Fail,
            format!("pipeline `{}` has no stage named `{}`", gate.pipeline_name, gate.review_stage),
        ),
        Err(error) => (CheckStatus::Fail, error.to_string()),
    };

    DoctorCheck { name: "pipeline_review_stage", status, details }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use costgate_core::config::AppConfig;
    use costgate_core::domain::thresholds::Thresholds;
    use rust_decimal::Decimal;

    use super::{check_thresholds, render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn zero_thresholds_are_called_out() {
        let config = AppConfig::default();
        let check = check_thresholds(&config);
        assert_eq!(check.status, CheckStatus::Pass);
        assert!(check.details.contains("every non-zero cost change"));
    }

    #[test]
    fn configured_thresholds_are_reported() {
        let mut config = AppConfig::default();
        config.thresholds = Thresholds::new(Decimal::new(100, 0), Decimal::new(10, 0));
        assert_eq!(check_thresholds(&config).details, "absolute 100$, percent 10%");
    }

    #[test]
    fn human_output_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Fail,
                    details: "gate.region is required".to_string(),
                },
                DoctorCheck::skipped("pipeline_review_stage"),
            ],
        };

        let rendered = render_human(&report);
        assert!(rendered.contains("- [fail] config_validation: gate.region is required"));
        assert!(rendered.contains("- [skip] pipeline_review_stage:"));
    }
}
