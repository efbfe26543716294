use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::EventError;

pub const TOTAL_MONTHLY_COST: &str = "total-monthly-cost";
pub const PAST_TOTAL_MONTHLY_COST: &str = "past-total-monthly-cost";
pub const DIFF_TOTAL_MONTHLY_COST: &str = "diff-total-monthly-cost";

/// Queue delivery batch as handed to the function by the event source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<InboundRecord>,
}

impl InboundBatch {
    pub fn from_json(raw: &str) -> Result<Self, EventError> {
        serde_json::from_str(raw).map_err(|error| EventError::Decode(error.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRecord {
    pub message_id: String,
    #[serde(default)]
    pub message_attributes: BTreeMap<String, MessageAttribute>,
    pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttribute {
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self { string_value: Some(value.into()), data_type: Some("Number".to_string()) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostFigures {
    pub total: Decimal,
    pub past: Decimal,
    pub diff: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostChangeEvent {
    pub message_id: String,
    pub figures: CostFigures,
    pub detail_text: String,
}

impl CostChangeEvent {
    pub fn from_record(record: &InboundRecord) -> Result<Self, EventError> {
        let figures = CostFigures {
            total: amount_attribute(record, TOTAL_MONTHLY_COST)?,
            past: amount_attribute(record, PAST_TOTAL_MONTHLY_COST)?,
            diff: amount_attribute(record, DIFF_TOTAL_MONTHLY_COST)?,
        };

        Ok(Self {
            message_id: record.message_id.clone(),
            figures,
            detail_text: record.body.clone(),
        })
    }
}

fn amount_attribute(record: &InboundRecord, name: &'static str) -> Result<Decimal, EventError> {
    let raw = record
        .message_attributes
        .get(name)
        .and_then(|attribute| attribute.string_value.as_deref())
        .ok_or(EventError::MissingAttribute { name })?;

    parse_amount(raw)
        .ok_or_else(|| EventError::InvalidAmount { name, value: raw.to_string() })
}

/// Parses a plain or scientific-notation amount. `NaN` and infinities have no
/// decimal representation and are rejected here, as are magnitudes beyond
/// `Decimal::MAX` (about 7.9e28).
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    Decimal::from_str(trimmed).ok().or_else(|| Decimal::from_scientific(trimmed).ok())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::{
        parse_amount, CostChangeEvent, InboundBatch, InboundRecord, MessageAttribute,
        DIFF_TOTAL_MONTHLY_COST, PAST_TOTAL_MONTHLY_COST, TOTAL_MONTHLY_COST,
    };
    use crate::errors::EventError;

    fn record(total: &str, past: &str, diff: &str) -> InboundRecord {
        let mut message_attributes = BTreeMap::new();
        message_attributes.insert(TOTAL_MONTHLY_COST.to_string(), MessageAttribute::string(total));
        message_attributes
            .insert(PAST_TOTAL_MONTHLY_COST.to_string(), MessageAttribute::string(past));
        message_attributes
            .insert(DIFF_TOTAL_MONTHLY_COST.to_string(), MessageAttribute::string(diff));
        InboundRecord {
            message_id: "msg-1".to_string(),
            message_attributes,
            body: "+ aws_instance.web  $40.00".to_string(),
        }
    }

    #[test]
    fn parses_figures_and_keeps_detail_text_verbatim() {
        let event = CostChangeEvent::from_record(&record("1100.50", "1000", "100.50"))
            .expect("record should parse");

        assert_eq!(event.message_id, "msg-1");
        assert_eq!(event.figures.total, Decimal::new(110_050, 2));
        assert_eq!(event.figures.past, Decimal::new(1000, 0));
        assert_eq!(event.figures.diff, Decimal::new(10_050, 2));
        assert_eq!(event.detail_text, "+ aws_instance.web  $40.00");
    }

    #[test]
    fn missing_attribute_is_malformed() {
        let mut incomplete = record("1", "1", "0");
        incomplete.message_attributes.remove(PAST_TOTAL_MONTHLY_COST);

        let error = CostChangeEvent::from_record(&incomplete).expect_err("should fail");
        assert_eq!(error, EventError::MissingAttribute { name: PAST_TOTAL_MONTHLY_COST });
    }

    #[test]
    fn non_numeric_and_non_finite_amounts_are_rejected() {
        for bad in ["abc", "", "NaN", "inf", "-infinity"] {
            let error =
                CostChangeEvent::from_record(&record("1", "1", bad)).expect_err("should fail");
            assert!(
                matches!(error, EventError::InvalidAmount { name, .. } if name == DIFF_TOTAL_MONTHLY_COST),
                "`{bad}` should be rejected"
            );
        }
    }

    #[test]
    fn amounts_accept_signs_whitespace_and_exponents() {
        assert_eq!(parse_amount(" -12.5 "), Some(Decimal::new(-125, 1)));
        assert_eq!(parse_amount("1e3"), Some(Decimal::new(1000, 0)));
        assert_eq!(parse_amount("   "), None);
    }

    #[test]
    fn amounts_beyond_decimal_range_are_invalid() {
        assert_eq!(parse_amount("1e29"), None);
        assert_eq!(
            CostChangeEvent::from_record(&record("1e29", "1000", "5")),
            Err(EventError::InvalidAmount {
                name: TOTAL_MONTHLY_COST,
                value: "1e29".to_string()
            })
        );
    }

    #[test]
    fn batch_decodes_queue_payload_and_ignores_unknown_fields() {
        let raw = r#"{
            "Records": [{
                "messageId": "059f36b4-87a3-44ab-83d2-661975830a7d",
                "receiptHandle": "AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a",
                "body": "diff details",
                "attributes": {"ApproximateReceiveCount": "1"},
                "messageAttributes": {
                    "total-monthly-cost": {"stringValue": "1040", "dataType": "Number"},
                    "past-total-monthly-cost": {"stringValue": "1000", "dataType": "Number"},
                    "diff-total-monthly-cost": {"stringValue": "40", "dataType": "Number"}
                },
                "eventSource": "aws:sqs"
            }]
        }"#;

        let batch = InboundBatch::from_json(raw).expect("batch should decode");
        assert_eq!(batch.records.len(), 1);

        let event = CostChangeEvent::from_record(&batch.records[0]).expect("record should parse");
        assert_eq!(event.figures.diff, Decimal::new(40, 0));
        assert_eq!(event.detail_text, "diff details");
    }

    #[test]
    fn batch_without_body_fails_to_decode() {
        let raw = r#"{"Records": [{"messageId": "m", "messageAttributes": {}}]}"#;
        assert!(matches!(InboundBatch::from_json(raw), Err(EventError::Decode(_))));
    }
}
