//! # Rule Logic Evaluators
//!
//! Rule logic is a closed vocabulary of three evaluators, selected by the
//! `type` tag of the logic payload:
//!
//! | type | payload | passes when |
//! |------|---------|-------------|
//! | `threshold` | `{field, threshold, operator}` | `entity[field] <op> threshold` |
//! | `validation` | `{checks: [{field, required}]}` | every required field is present |
//! | `comparison` | `{field1, field2, operator}` | the two fields are (un)equal |
//!
//! Evaluators are pure functions of the logic and the entity data. A missing
//! or mistyped field is a business verdict (`passed = false` with the field
//! named in the details), never an error. Malformed payloads are rejected
//! with [`LceError::UnsupportedLogic`] when parsed.
//!
//! Each evaluation reports how many fields it inspected. The engine uses
//! that count as the logical execution cost so replays stay identical.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use lce_core::{EntityData, LceError, LceResult, Lookup};

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Numeric comparison operator of a threshold rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOperator {
    /// `>`
    #[default]
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `==`
    #[serde(rename = "==")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
}

impl ThresholdOperator {
    /// The operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    /// Apply the operator to `observed <op> threshold`.
    pub fn holds(&self, observed: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => observed > threshold,
            Self::Ge => observed >= threshold,
            Self::Lt => observed < threshold,
            Self::Le => observed <= threshold,
            Self::Eq => observed == threshold,
            Self::Ne => observed != threshold,
        }
    }
}

/// Operator of a comparison rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EqualityOperator {
    /// The fields must be equal.
    #[default]
    #[serde(rename = "==")]
    Eq,
    /// The fields must differ.
    #[serde(rename = "!=")]
    Ne,
}

impl EqualityOperator {
    /// The operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `threshold` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdLogic {
    /// Numeric field to compare.
    pub field: String,
    /// Literal to compare against.
    pub threshold: f64,
    /// Comparison operator.
    #[serde(default)]
    pub operator: ThresholdOperator,
}

/// One field check of a `validation` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldCheck {
    /// Field name.
    pub field: String,
    /// Whether absence fails the rule.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// `validation` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationLogic {
    /// Checks, evaluated in order.
    pub checks: Vec<FieldCheck>,
}

/// `comparison` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonLogic {
    /// Left-hand field.
    pub field1: String,
    /// Right-hand field.
    pub field2: String,
    /// Equality or inequality.
    #[serde(default)]
    pub operator: EqualityOperator,
}

/// A parsed logic payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleLogic {
    /// Numeric field against a literal.
    Threshold(ThresholdLogic),
    /// Required-field presence.
    Validation(ValidationLogic),
    /// Field against field.
    Comparison(ComparisonLogic),
}

/// The verdict of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Business verdict.
    pub passed: bool,
    /// Evaluator-specific score.
    pub score: Option<f64>,
    /// Evaluator-specific details.
    pub details: Value,
    /// Number of entity fields looked up.
    pub fields_inspected: u64,
}

impl RuleLogic {
    /// Parse and check a logic payload.
    pub fn parse(rule_id: &str, logic: &Value) -> LceResult<Self> {
        let unsupported = |reason: String| LceError::UnsupportedLogic {
            rule_id: rule_id.to_string(),
            reason,
        };
        let tag = logic
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| unsupported("logic payload has no \"type\" tag".to_string()))?;
        if !matches!(tag, "threshold" | "validation" | "comparison") {
            return Err(unsupported(format!("unknown logic type \"{tag}\"")));
        }
        let parsed: Self = serde_json::from_value(logic.clone())
            .map_err(|e| unsupported(format!("malformed {tag} logic: {e}")))?;

        match &parsed {
            Self::Threshold(t) => {
                if t.field.trim().is_empty() {
                    return Err(unsupported("threshold field is empty".to_string()));
                }
                if !t.threshold.is_finite() {
                    return Err(unsupported("threshold must be finite".to_string()));
                }
            }
            Self::Validation(v) => {
                if v.checks.is_empty() {
                    return Err(unsupported("validation logic has no checks".to_string()));
                }
                if v.checks.iter().any(|c| c.field.trim().is_empty()) {
                    return Err(unsupported("validation check with empty field".to_string()));
                }
            }
            Self::Comparison(c) => {
                if c.field1.trim().is_empty() || c.field2.trim().is_empty() {
                    return Err(unsupported("comparison field is empty".to_string()));
                }
            }
        }
        Ok(parsed)
    }

    /// The evaluator name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Threshold(_) => "threshold",
            Self::Validation(_) => "validation",
            Self::Comparison(_) => "comparison",
        }
    }

    /// Evaluate against entity data.
    pub fn evaluate(&self, data: &EntityData) -> Evaluation {
        match self {
            Self::Threshold(t) => evaluate_threshold(t, data),
            Self::Validation(v) => evaluate_validation(v, data),
            Self::Comparison(c) => evaluate_comparison(c, data),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluators
// ---------------------------------------------------------------------------

fn evaluate_threshold(logic: &ThresholdLogic, data: &EntityData) -> Evaluation {
    let mut details = Map::new();
    details.insert("field".into(), json!(logic.field));
    details.insert("threshold".into(), json!(logic.threshold));
    details.insert("operator".into(), json!(logic.operator.symbol()));

    let (passed, score) = match data.number(&logic.field) {
        Lookup::Found(observed) => {
            details.insert("observed".into(), json!(observed));
            (logic.operator.holds(observed, logic.threshold), Some(observed))
        }
        Lookup::Missing => {
            details.insert("missing_field".into(), json!(logic.field));
            (false, None)
        }
        Lookup::WrongType(found) => {
            details.insert("invalid_field".into(), json!(logic.field));
            details.insert("found_type".into(), json!(found));
            (false, None)
        }
    };
    Evaluation {
        passed,
        score,
        details: Value::Object(details),
        fields_inspected: 1,
    }
}

fn evaluate_validation(logic: &ValidationLogic, data: &EntityData) -> Evaluation {
    let mut missing = Vec::new();
    let mut satisfied = 0usize;
    for check in &logic.checks {
        if data.contains(&check.field) {
            satisfied += 1;
        } else if check.required {
            missing.push(check.field.clone());
        } else {
            satisfied += 1;
        }
    }
    let total = logic.checks.len();
    Evaluation {
        passed: missing.is_empty(),
        score: Some(satisfied as f64 / total as f64),
        details: json!({
            "checked": total,
            "missing_fields": missing,
        }),
        fields_inspected: total as u64,
    }
}

fn evaluate_comparison(logic: &ComparisonLogic, data: &EntityData) -> Evaluation {
    let left = data.get(&logic.field1);
    let right = data.get(&logic.field2);
    let (passed, details) = match (left, right) {
        (Some(l), Some(r)) => {
            let equal = l == r;
            let passed = match logic.operator {
                EqualityOperator::Eq => equal,
                EqualityOperator::Ne => !equal,
            };
            (
                passed,
                json!({
                    "field1": logic.field1,
                    "field2": logic.field2,
                    "operator": logic.operator.symbol(),
                    "value1": l.to_json(),
                    "value2": r.to_json(),
                }),
            )
        }
        _ => {
            let missing: Vec<&str> = [(&logic.field1, left), (&logic.field2, right)]
                .into_iter()
                .filter(|(_, v)| v.is_none())
                .map(|(f, _)| f.as_str())
                .collect();
            (
                false,
                json!({
                    "field1": logic.field1,
                    "field2": logic.field2,
                    "operator": logic.operator.symbol(),
                    "missing_fields": missing,
                }),
            )
        }
    };
    Evaluation {
        passed,
        score: None,
        details,
        fields_inspected: 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold(op: &str) -> RuleLogic {
        RuleLogic::parse(
            "R1",
            &json!({"type": "threshold", "field": "amount", "threshold": 1000, "operator": op}),
        )
        .unwrap()
    }

    #[test]
    fn threshold_greater_than() {
        let logic = threshold(">");
        let pass = logic.evaluate(&EntityData::new().with("amount", 1500.0));
        assert!(pass.passed);
        assert_eq!(pass.score, Some(1500.0));
        assert!(!logic.evaluate(&EntityData::new().with("amount", 500.0)).passed);
        assert!(!logic.evaluate(&EntityData::new().with("amount", 1000.0)).passed);
    }

    #[test]
    fn threshold_missing_field_is_a_verdict() {
        let eval = threshold(">").evaluate(&EntityData::new());
        assert!(!eval.passed);
        assert_eq!(eval.details["missing_field"], "amount");
        assert_eq!(eval.score, None);
    }

    #[test]
    fn threshold_non_numeric_field() {
        let eval = threshold(">").evaluate(&EntityData::new().with("amount", "lots"));
        assert!(!eval.passed);
        assert_eq!(eval.details["invalid_field"], "amount");
        assert_eq!(eval.details["found_type"], "string");
    }

    #[test]
    fn threshold_operator_defaults_to_greater_than() {
        let logic = RuleLogic::parse(
            "R1",
            &json!({"type": "threshold", "field": "amount", "threshold": 10}),
        )
        .unwrap();
        match logic {
            RuleLogic::Threshold(t) => assert_eq!(t.operator, ThresholdOperator::Gt),
            other => panic!("unexpected logic {other:?}"),
        }
    }

    #[test]
    fn every_threshold_operator() {
        let data = EntityData::new().with("amount", 1000.0);
        assert!(threshold(">=").evaluate(&data).passed);
        assert!(threshold("<=").evaluate(&data).passed);
        assert!(threshold("==").evaluate(&data).passed);
        assert!(!threshold("!=").evaluate(&data).passed);
        assert!(!threshold("<").evaluate(&data).passed);
    }

    #[test]
    fn validation_aggregates_missing_fields() {
        let logic = RuleLogic::parse(
            "KYC",
            &json!({"type": "validation", "checks": [
                {"field": "full_name", "required": true},
                {"field": "national_id", "required": true},
                {"field": "address", "required": true},
                {"field": "phone", "required": false}
            ]}),
        )
        .unwrap();
        let eval = logic.evaluate(&EntityData::new().with("full_name", "Ada"));
        assert!(!eval.passed);
        assert_eq!(eval.details["missing_fields"], json!(["national_id", "address"]));
        assert_eq!(eval.score, Some(0.5));
        assert_eq!(eval.fields_inspected, 4);
    }

    #[test]
    fn comparison_requires_both_fields() {
        let logic = RuleLogic::parse(
            "CMP",
            &json!({"type": "comparison", "field1": "declared_income", "field2": "verified_income"}),
        )
        .unwrap();
        let eq = EntityData::new()
            .with("declared_income", 50.0)
            .with("verified_income", 50.0);
        assert!(logic.evaluate(&eq).passed);

        let missing = logic.evaluate(&EntityData::new().with("declared_income", 50.0));
        assert!(!missing.passed);
        assert_eq!(missing.details["missing_fields"], json!(["verified_income"]));
    }

    #[test]
    fn comparison_not_equal() {
        let logic = RuleLogic::parse(
            "CMP",
            &json!({"type": "comparison", "field1": "a", "field2": "b", "operator": "!="}),
        )
        .unwrap();
        assert!(logic.evaluate(&EntityData::new().with("a", "x").with("b", "y")).passed);
        assert!(!logic.evaluate(&EntityData::new().with("a", "x").with("b", "x")).passed);
    }

    #[test]
    fn malformed_payloads_are_unsupported() {
        for bad in [
            json!({"field": "amount"}),
            json!({"type": "regex", "pattern": ".*"}),
            json!({"type": "threshold", "field": "amount"}),
            json!({"type": "threshold", "field": "amount", "threshold": 1, "operator": "~"}),
            json!({"type": "validation", "checks": []}),
            json!({"type": "comparison", "field1": "a"}),
        ] {
            let err = RuleLogic::parse("R9", &bad).unwrap_err();
            assert!(matches!(err, LceError::UnsupportedLogic { .. }), "{bad}");
        }
    }
}
