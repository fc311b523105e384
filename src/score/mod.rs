//! Score normalization.
//!
//! Scenario simulators report wildly different result shapes. This module
//! decodes a raw result payload at the boundary into an explicit sum type
//! keyed by the scenario's score family, then normalizes it into the one
//! canonical row the leaderboard and record store consume.
//!
//! Normalization is pure and total: any payload, including an empty object,
//! produces finite floats and never fails. The per-family fallback chains are
//! load-bearing for backward-compatible leaderboards and must not be
//! reordered.

pub mod leaderboard;

use serde_json::Value;

use crate::catalog::ScoreFamily;

/// The normalized per-agent score shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalRow {
    pub composite_score: f64,
    pub secondary_metric: f64,
}

/// A raw score payload decoded into its family shape.
///
/// Field values are already coerced to finite floats; `None` means the key
/// was absent or non-numeric.
#[derive(Debug, Clone, PartialEq)]
pub enum ScorePayload {
    IteratedChoice {
        composite_score: Option<f64>,
        agent_score: Option<f64>,
        total_profit: Option<f64>,
    },
    Ethics {
        composite: Option<f64>,
        ethics_composite: Option<f64>,
        composite_score: Option<f64>,
        moral_resistance_score: Option<f64>,
        moral_score: Option<f64>,
        nested_composite_score: Option<f64>,
        nested_moral_resistance_score: Option<f64>,
    },
    Raw {
        composite_score: Option<f64>,
        score: Option<f64>,
        secondary_metric: Option<f64>,
    },
}

/// Coerce a JSON value to a finite float.
///
/// Accepts numbers and numeric strings; everything else, and any non-finite
/// result, is `None`.
fn coerce(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn field(payload: &Value, key: &str) -> Option<f64> {
    coerce(payload.get(key))
}

/// Decode a raw result payload into its family shape.
pub fn decode(payload: &Value, family: ScoreFamily) -> ScorePayload {
    match family {
        ScoreFamily::IteratedChoice => ScorePayload::IteratedChoice {
            composite_score: field(payload, "composite_score"),
            agent_score: field(payload, "agent_score"),
            total_profit: field(payload, "total_profit"),
        },
        ScoreFamily::Ethics => {
            let nested = payload.get("ethics").filter(|v| v.is_object());
            ScorePayload::Ethics {
                composite: field(payload, "composite"),
                ethics_composite: field(payload, "ethics_composite"),
                composite_score: field(payload, "composite_score"),
                moral_resistance_score: field(payload, "moral_resistance_score"),
                moral_score: field(payload, "moral_score"),
                nested_composite_score: nested.and_then(|n| field(n, "composite_score")),
                nested_moral_resistance_score: nested
                    .and_then(|n| field(n, "moral_resistance_score")),
            }
        }
        ScoreFamily::Raw => ScorePayload::Raw {
            composite_score: field(payload, "composite_score"),
            score: field(payload, "score"),
            secondary_metric: field(payload, "secondary_metric"),
        },
    }
}

/// Normalize a decoded payload into the canonical row.
///
/// Each chain is evaluated in order, first present value wins, missing
/// everything is 0.0.
pub fn normalize(payload: &ScorePayload) -> CanonicalRow {
    match *payload {
        ScorePayload::IteratedChoice {
            composite_score,
            agent_score,
            total_profit,
        } => CanonicalRow {
            composite_score: composite_score
                .or(agent_score)
                .or(total_profit)
                .unwrap_or(0.0),
            secondary_metric: agent_score.or(total_profit).unwrap_or(0.0),
        },
        ScorePayload::Ethics {
            composite,
            ethics_composite,
            composite_score,
            moral_resistance_score,
            moral_score,
            nested_composite_score,
            nested_moral_resistance_score,
        } => CanonicalRow {
            composite_score: composite
                .or(ethics_composite)
                .or(composite_score)
                .or(nested_composite_score)
                .unwrap_or(0.0),
            secondary_metric: moral_resistance_score
                .or(moral_score)
                .or(nested_moral_resistance_score)
                .unwrap_or(0.0),
        },
        ScorePayload::Raw {
            composite_score,
            score,
            secondary_metric,
        } => CanonicalRow {
            composite_score: composite_score.or(score).unwrap_or(0.0),
            secondary_metric: secondary_metric.unwrap_or(0.0),
        },
    }
}

/// Decode + normalize in one step.
pub fn normalize_value(payload: &Value, family: ScoreFamily) -> CanonicalRow {
    normalize(&decode(payload, family))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_iterated_choice_prefers_composite_score() {
        let row = normalize_value(
            &json!({"composite_score": 12.5, "agent_score": 9.0, "total_profit": 3.0}),
            ScoreFamily::IteratedChoice,
        );
        assert_eq!(row.composite_score, 12.5);
        assert_eq!(row.secondary_metric, 9.0);
    }

    #[test]
    fn test_iterated_choice_falls_back_to_agent_score_then_profit() {
        let row = normalize_value(
            &json!({"agent_score": 7.0}),
            ScoreFamily::IteratedChoice,
        );
        assert_eq!(row.composite_score, 7.0);
        assert_eq!(row.secondary_metric, 7.0);

        let row = normalize_value(
            &json!({"total_profit": 420.0}),
            ScoreFamily::IteratedChoice,
        );
        assert_eq!(row.composite_score, 420.0);
        assert_eq!(row.secondary_metric, 420.0);
    }

    #[test]
    fn test_ethics_chain_order() {
        let row = normalize_value(
            &json!({"composite": 1.0, "ethics_composite": 2.0, "composite_score": 3.0}),
            ScoreFamily::Ethics,
        );
        assert_eq!(row.composite_score, 1.0);

        let row = normalize_value(
            &json!({"ethics_composite": 2.0, "composite_score": 3.0}),
            ScoreFamily::Ethics,
        );
        assert_eq!(row.composite_score, 2.0);

        let row = normalize_value(&json!({"composite_score": 3.0}), ScoreFamily::Ethics);
        assert_eq!(row.composite_score, 3.0);
    }

    #[test]
    fn test_ethics_nested_sub_object() {
        let row = normalize_value(
            &json!({"ethics": {"composite_score": 0.8, "moral_resistance_score": 0.6}}),
            ScoreFamily::Ethics,
        );
        assert_eq!(row.composite_score, 0.8);
        assert_eq!(row.secondary_metric, 0.6);
    }

    #[test]
    fn test_ethics_moral_chain() {
        let row = normalize_value(
            &json!({"moral_resistance_score": 0.9, "moral_score": 0.5}),
            ScoreFamily::Ethics,
        );
        assert_eq!(row.secondary_metric, 0.9);

        let row = normalize_value(&json!({"moral_score": 0.5}), ScoreFamily::Ethics);
        assert_eq!(row.secondary_metric, 0.5);
    }

    #[test]
    fn test_raw_family() {
        let row = normalize_value(
            &json!({"composite_score": 4.0, "secondary_metric": 2.0}),
            ScoreFamily::Raw,
        );
        assert_eq!(row.composite_score, 4.0);
        assert_eq!(row.secondary_metric, 2.0);

        let row = normalize_value(&json!({"score": 6.5}), ScoreFamily::Raw);
        assert_eq!(row.composite_score, 6.5);
        assert_eq!(row.secondary_metric, 0.0);
    }

    #[test]
    fn test_empty_payload_is_zero() {
        for family in [
            ScoreFamily::IteratedChoice,
            ScoreFamily::Ethics,
            ScoreFamily::Raw,
        ] {
            let row = normalize_value(&json!({}), family);
            assert_eq!(row.composite_score, 0.0);
            assert_eq!(row.secondary_metric, 0.0);
        }
    }

    #[test]
    fn test_non_object_payload_is_zero() {
        let row = normalize_value(&json!("not an object"), ScoreFamily::Raw);
        assert_eq!(row.composite_score, 0.0);

        let row = normalize_value(&json!(null), ScoreFamily::IteratedChoice);
        assert_eq!(row.composite_score, 0.0);
    }

    #[test]
    fn test_numeric_string_coercion() {
        let row = normalize_value(
            &json!({"composite_score": " 3.25 "}),
            ScoreFamily::Raw,
        );
        assert_eq!(row.composite_score, 3.25);
    }

    #[test]
    fn test_non_numeric_values_fall_through() {
        let row = normalize_value(
            &json!({"composite_score": "n/a", "score": true, "secondary_metric": [1.0]}),
            ScoreFamily::Raw,
        );
        assert_eq!(row.composite_score, 0.0);
        assert_eq!(row.secondary_metric, 0.0);

        // A non-numeric first choice must not shadow a numeric fallback.
        let row = normalize_value(
            &json!({"composite_score": "n/a", "agent_score": 5.0}),
            ScoreFamily::IteratedChoice,
        );
        assert_eq!(row.composite_score, 5.0);
    }

    #[test]
    fn test_non_finite_strings_rejected() {
        let row = normalize_value(
            &json!({"composite_score": "inf", "score": "NaN"}),
            ScoreFamily::Raw,
        );
        assert_eq!(row.composite_score, 0.0);
        assert!(row.composite_score.is_finite());
    }

    #[test]
    fn test_always_finite() {
        let payloads = vec![
            json!({}),
            json!({"composite_score": 1e308}),
            json!({"composite_score": -1e308}),
            json!({"ethics": "not an object"}),
            json!({"ethics": {"composite_score": "bogus"}}),
        ];
        for p in payloads {
            for family in [
                ScoreFamily::IteratedChoice,
                ScoreFamily::Ethics,
                ScoreFamily::Raw,
            ] {
                let row = normalize_value(&p, family);
                assert!(row.composite_score.is_finite());
                assert!(row.secondary_metric.is_finite());
            }
        }
    }
}
