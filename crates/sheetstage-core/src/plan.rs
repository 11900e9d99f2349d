//! Plan service wire types.
//!
//! Mirrors the JSON contract of the external plan service: collected slots,
//! the computed valuation figures, and the list of draft operations. Slot
//! values arrive as strings or numbers depending on how the service
//! extracted them, so numeric fields deserialize from either.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use sheetstage_model::CellValue;

/// Plans are capped server-side; enforce the same cap on ingest.
pub const MAX_PLAN_OPS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Write,
    Formula,
    Color,
}

/// One atomic instruction targeting exactly one range.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionOp {
    pub id: String,
    pub range: String,
    #[serde(rename = "type")]
    pub kind: OpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Vec<CellValue>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ActionOp {
    /// Whether the op carries the payload its declared type requires.
    pub fn has_required_payload(&self) -> bool {
        match self.kind {
            OpKind::Write => self.values.as_ref().is_some_and(|v| !v.is_empty()),
            OpKind::Formula => self
                .formula
                .as_ref()
                .is_some_and(|f| !f.trim().is_empty()),
            OpKind::Color => self.color.as_ref().is_some_and(|c| !c.trim().is_empty()),
        }
    }
}

/// Conversation-collected round parameters (camelCase on the wire).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Slots {
    #[serde(rename = "roundType", default)]
    pub round_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub amount: Option<f64>,
    #[serde(rename = "preMoney", default, deserialize_with = "lenient_number")]
    pub pre_money: Option<f64>,
    #[serde(rename = "poolPct", default, deserialize_with = "lenient_number")]
    pub pool_pct: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Investor {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub investment: Option<f64>,
}

/// Backend-computed figures consumed by the projection renderer. Missing
/// fields render as blanks rather than failing the projection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CalculatedValues {
    #[serde(default, deserialize_with = "lenient_number")]
    pub post_money_valuation: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_per_share: Option<f64>,
    #[serde(default)]
    pub final_share_counts: BTreeMap<String, f64>,
    #[serde(default)]
    pub final_ownership_pct: BTreeMap<String, f64>,
    #[serde(default)]
    pub parsed_investors: Vec<Investor>,
}

/// Everything the plan service returns for one generation request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanResult {
    #[serde(default)]
    pub slots: Slots,
    #[serde(default)]
    pub calculated_values: CalculatedValues,
    #[serde(default)]
    pub column_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub ops: Vec<ActionOp>,
    /// Raw model output, kept for debugging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_llm_output: Option<String>,
}

impl PlanResult {
    /// Ops to stage, truncated to [`MAX_PLAN_OPS`] like the service does.
    pub fn sanitized_ops(&self) -> &[ActionOp] {
        if self.ops.len() > MAX_PLAN_OPS {
            tracing::warn!(
                total = self.ops.len(),
                kept = MAX_PLAN_OPS,
                "plan exceeds op cap, truncating"
            );
            &self.ops[..MAX_PLAN_OPS]
        } else {
            &self.ops
        }
    }
}

/// Accept a number, a numeric string, null, or a missing field.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Null(()),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None | Some(Raw::Null(())) => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            Ok(cleaned.parse::<f64>().ok())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_service_shaped_plan() {
        let json = r##"{
            "slots": {"roundType": "Series A", "amount": "5000000", "preMoney": 20000000, "poolPct": "10"},
            "calculated_values": {
                "post_money_valuation": 25000000,
                "price_per_share": 37.5,
                "final_share_counts": {"Acme Fund": 100000, "New Investors": 500000},
                "final_ownership_pct": {"Acme Fund": 0.04},
                "parsed_investors": [{"name": "Acme Fund", "investment": "1000000"}]
            },
            "ops": [
                {"id": "op-1", "range": "A1:B2", "type": "write",
                 "values": [["Round", null], [1, 2]], "formula": null, "note": "headers"},
                {"id": "op-2", "range": "C1:C3", "type": "formula", "formula": "=SUM(A1:B1)"},
                {"id": "op-3", "range": "A1", "type": "color", "color": "#4F81BD"}
            ]
        }"##;

        let plan: PlanResult = serde_json::from_str(json).unwrap();
        assert_eq!(plan.slots.round_type.as_deref(), Some("Series A"));
        assert_eq!(plan.slots.amount, Some(5_000_000.0));
        assert_eq!(plan.slots.pool_pct, Some(10.0));
        assert_eq!(plan.calculated_values.parsed_investors[0].investment, Some(1_000_000.0));
        assert_eq!(plan.ops.len(), 3);
        assert_eq!(plan.ops[0].kind, OpKind::Write);
        assert_eq!(plan.ops[1].kind, OpKind::Formula);
        assert_eq!(plan.ops[2].kind, OpKind::Color);
    }

    #[test]
    fn test_lenient_number_strips_currency_noise() {
        let slots: Slots = serde_json::from_str(r#"{"amount": "$5,000,000"}"#).unwrap();
        assert_eq!(slots.amount, Some(5_000_000.0));
    }

    #[test]
    fn test_has_required_payload() {
        let mut op = ActionOp {
            id: "op-1".into(),
            range: "A1".into(),
            kind: OpKind::Write,
            values: None,
            formula: None,
            color: None,
            note: None,
        };
        assert!(!op.has_required_payload());

        op.values = Some(vec![vec![CellValue::number(1.0)]]);
        assert!(op.has_required_payload());

        op.kind = OpKind::Formula;
        assert!(!op.has_required_payload());
        op.formula = Some("=A1".into());
        assert!(op.has_required_payload());
    }

    #[test]
    fn test_sanitized_ops_caps_at_limit() {
        let op = ActionOp {
            id: "op".into(),
            range: "A1".into(),
            kind: OpKind::Formula,
            values: None,
            formula: Some("=1".into()),
            color: None,
            note: None,
        };
        let plan = PlanResult {
            ops: vec![op; MAX_PLAN_OPS + 5],
            ..PlanResult::default()
        };
        assert_eq!(plan.sanitized_ops().len(), MAX_PLAN_OPS);
    }

    #[test]
    fn test_missing_calculated_fields_default() {
        let plan: PlanResult = serde_json::from_str(r#"{"ops": []}"#).unwrap();
        assert!(plan.calculated_values.post_money_valuation.is_none());
        assert!(plan.calculated_values.parsed_investors.is_empty());
        assert!(plan.raw_llm_output.is_none());
    }
}
