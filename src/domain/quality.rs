//! Quality control domain types and inspection rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::settings::QcCriteria;

/// Outcome of an inspection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QcDecision {
    Accepted,
    OnHold,
    Rejected,
}

impl QcDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::OnHold => "on_hold",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            _ => Self::OnHold,
        }
    }
}

/// A criterion the sample failed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub criterion: String,
    pub measured: f64,
    pub limit: f64,
    /// Decision this finding forces on its own
    pub outcome: QcDecision,
}

/// Measured values taken from a sample
#[derive(Debug, Clone, Copy, Default)]
pub struct Measurements {
    pub pulp_temp_c: Option<f64>,
    pub brix: Option<f64>,
    pub defect_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: QcDecision,
    pub findings: Vec<Finding>,
}

/// Apply the tenant's criteria to a sample.
///
/// Excess defects reject the lot. A warm pulp or low sugar content only puts
/// it on hold. The most severe finding wins; no findings means accepted.
/// Measurements that were not taken are not judged.
pub fn evaluate(measurements: &Measurements, criteria: &QcCriteria) -> Evaluation {
    let mut findings = Vec::new();

    if let Some(defect_pct) = measurements.defect_pct {
        if defect_pct > criteria.max_defect_pct {
            findings.push(Finding {
                criterion: "defect_pct".to_string(),
                measured: defect_pct,
                limit: criteria.max_defect_pct,
                outcome: QcDecision::Rejected,
            });
        }
    }

    if let Some(temp) = measurements.pulp_temp_c {
        if temp > criteria.max_pulp_temp_c {
            findings.push(Finding {
                criterion: "pulp_temp_c".to_string(),
                measured: temp,
                limit: criteria.max_pulp_temp_c,
                outcome: QcDecision::OnHold,
            });
        }
    }

    if let (Some(brix), Some(min_brix)) = (measurements.brix, criteria.min_brix) {
        if brix < min_brix {
            findings.push(Finding {
                criterion: "brix".to_string(),
                measured: brix,
                limit: min_brix,
                outcome: QcDecision::OnHold,
            });
        }
    }

    let decision = findings
        .iter()
        .map(|f| f.outcome)
        .max()
        .unwrap_or(QcDecision::Accepted);

    Evaluation { decision, findings }
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityCheckResponse {
    pub id: Uuid,
    pub receiving_id: Uuid,
    pub grn_number: String,
    pub line_id: Option<Uuid>,
    pub inspector_id: Uuid,
    pub pulp_temp_c: Option<f64>,
    pub brix: Option<f64>,
    pub defect_pct: Option<f64>,
    pub sample_size: Option<i32>,
    pub visual_grade: Option<String>,
    pub computed_decision: QcDecision,
    pub decision: QcDecision,
    pub findings: Vec<Finding>,
    pub override_reason: Option<String>,
    pub notes: Option<String>,
    pub inspected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQualityCheckRequest {
    pub receiving_id: Uuid,
    #[serde(default)]
    pub line_id: Option<Uuid>,
    #[serde(default)]
    #[validate(range(max = 60.0))]
    pub pulp_temp_c: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub brix: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub defect_pct: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub sample_size: Option<i32>,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub visual_grade: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub decision_override: Option<QcDecision>,
    #[serde(default)]
    pub override_reason: Option<String>,
    #[serde(default)]
    pub inspected_at: Option<DateTime<Utc>>,
}

impl CreateQualityCheckRequest {
    pub fn measurements(&self) -> Measurements {
        Measurements {
            pulp_temp_c: self.pulp_temp_c,
            brix: self.brix,
            defect_pct: self.defect_pct,
        }
    }

    /// An override must come with a reason.
    pub fn override_reason_missing(&self) -> bool {
        self.decision_override.is_some()
            && self
                .override_reason
                .as_deref()
                .map(|r| r.trim().is_empty())
                .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QualityCheckQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub receiving_id: Option<Uuid>,
    pub decision: Option<QcDecision>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QualityStatsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QualityStats {
    pub total: i64,
    pub accepted: i64,
    pub on_hold: i64,
    pub rejected: i64,
    /// Accepted share of all decisions, as a percentage; `None` without checks
    pub acceptance_rate: Option<f64>,
}

impl QualityStats {
    pub fn from_counts(accepted: i64, on_hold: i64, rejected: i64) -> Self {
        let total = accepted + on_hold + rejected;
        let acceptance_rate = if total > 0 {
            Some(((accepted as f64 / total as f64) * 10_000.0).round() / 100.0)
        } else {
            None
        };

        Self {
            total,
            accepted,
            on_hold,
            rejected,
            acceptance_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> QcCriteria {
        QcCriteria {
            max_defect_pct: 5.0,
            max_pulp_temp_c: 8.0,
            min_brix: Some(10.0),
        }
    }

    #[test]
    fn clean_sample_is_accepted() {
        let eval = evaluate(
            &Measurements {
                pulp_temp_c: Some(6.5),
                brix: Some(12.0),
                defect_pct: Some(5.0),
            },
            &criteria(),
        );
        assert_eq!(eval.decision, QcDecision::Accepted);
        assert!(eval.findings.is_empty());
    }

    #[test]
    fn excess_defects_reject_even_with_other_findings() {
        let eval = evaluate(
            &Measurements {
                pulp_temp_c: Some(11.0),
                brix: Some(12.0),
                defect_pct: Some(7.5),
            },
            &criteria(),
        );
        assert_eq!(eval.decision, QcDecision::Rejected);
        assert_eq!(eval.findings.len(), 2);
        assert_eq!(eval.findings[0].criterion, "defect_pct");
    }

    #[test]
    fn warm_or_unripe_produce_is_held() {
        let warm = evaluate(
            &Measurements {
                pulp_temp_c: Some(9.1),
                ..Default::default()
            },
            &criteria(),
        );
        assert_eq!(warm.decision, QcDecision::OnHold);

        let unripe = evaluate(
            &Measurements {
                brix: Some(8.0),
                ..Default::default()
            },
            &criteria(),
        );
        assert_eq!(unripe.decision, QcDecision::OnHold);
        assert_eq!(unripe.findings[0].limit, 10.0);
    }

    #[test]
    fn brix_is_ignored_without_a_minimum() {
        let eval = evaluate(
            &Measurements {
                brix: Some(2.0),
                ..Default::default()
            },
            &QcCriteria::default(),
        );
        assert_eq!(eval.decision, QcDecision::Accepted);
    }

    #[test]
    fn override_needs_reason() {
        let mut req: CreateQualityCheckRequest = serde_json::from_value(serde_json::json!({
            "receiving_id": Uuid::new_v4(),
            "defect_pct": 9.0,
            "decision_override": "accepted"
        }))
        .unwrap();
        assert!(req.override_reason_missing());

        req.override_reason = Some("Buyer accepted downgrade".to_string());
        assert!(!req.override_reason_missing());
    }

    #[test]
    fn acceptance_rate_is_rounded_percentage() {
        let stats = QualityStats::from_counts(2, 0, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.acceptance_rate, Some(66.67));
        assert_eq!(QualityStats::from_counts(0, 0, 0).acceptance_rate, None);
    }
}
