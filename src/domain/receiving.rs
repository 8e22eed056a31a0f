//! Goods receiving domain types
//!
//! A receiving is one supplier delivery; its printable form is the
//! Goods Received Note (GRN).

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use super::employees::non_negative;
use super::quality::QcDecision;
use super::suppliers::SupplierResponse;

pub const GRN_PREFIX: &str = "GRN";

/// Receiving status, driven by QC decisions or set manually
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceivingStatus {
    PendingQc,
    Accepted,
    OnHold,
    Rejected,
}

impl ReceivingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingQc => "pending_qc",
            Self::Accepted => "accepted",
            Self::OnHold => "on_hold",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "accepted" => Self::Accepted,
            "on_hold" => Self::OnHold,
            "rejected" => Self::Rejected,
            _ => Self::PendingQc,
        }
    }
}

impl From<QcDecision> for ReceivingStatus {
    fn from(decision: QcDecision) -> Self {
        match decision {
            QcDecision::Accepted => Self::Accepted,
            QcDecision::OnHold => Self::OnHold,
            QcDecision::Rejected => Self::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReceivingLineResponse {
    pub id: Uuid,
    pub line_no: i32,
    pub product: String,
    pub variety: Option<String>,
    pub lot_number: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceivingResponse {
    pub id: Uuid,
    pub grn_number: String,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub vehicle_plate: Option<String>,
    pub driver_name: Option<String>,
    pub received_at: DateTime<Utc>,
    pub status: ReceivingStatus,
    pub notes: Option<String>,
    pub received_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<ReceivingLineResponse>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceivingLineRequest {
    #[validate(length(min = 1, max = 200))]
    pub product: String,
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub lot_number: Option<String>,
    #[validate(custom(function = "positive"))]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 16))]
    pub unit: String,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReceivingRequest {
    pub supplier_id: Uuid,
    #[serde(default)]
    pub vehicle_plate: Option<String>,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one line is required"), nested)]
    pub lines: Vec<ReceivingLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateReceivingStatusRequest {
    pub status: ReceivingStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReceivingQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub supplier_id: Option<Uuid>,
    pub status: Option<ReceivingStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// One priced line on a GRN
#[derive(Debug, Clone, Serialize)]
pub struct GrnLine {
    pub line_no: i32,
    pub product: String,
    pub variety: Option<String>,
    pub lot_number: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Goods Received Note document
#[derive(Debug, Clone, Serialize)]
pub struct GoodsReceivedNote {
    pub grn_number: String,
    pub receiving_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub status: ReceivingStatus,
    pub supplier: SupplierResponse,
    pub vehicle_plate: Option<String>,
    pub driver_name: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<GrnLine>,
    /// Quantity per unit of measure; units are never summed together
    pub quantity_totals: BTreeMap<String, Decimal>,
    pub grand_total: Decimal,
    pub qc_decision: Option<QcDecision>,
    pub generated_at: DateTime<Utc>,
}

impl GoodsReceivedNote {
    pub fn build(
        receiving: ReceivingResponse,
        supplier: SupplierResponse,
        lines: Vec<ReceivingLineResponse>,
        qc_decision: Option<QcDecision>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut quantity_totals: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut grand_total = Decimal::ZERO;

        let lines: Vec<GrnLine> = lines
            .into_iter()
            .map(|line| {
                let line_total = money(line.quantity * line.unit_price);
                grand_total += line_total;
                *quantity_totals.entry(line.unit.clone()).or_default() += line.quantity;

                GrnLine {
                    line_no: line.line_no,
                    product: line.product,
                    variety: line.variety,
                    lot_number: line.lot_number,
                    quantity: line.quantity,
                    unit: line.unit,
                    unit_price: line.unit_price,
                    line_total,
                }
            })
            .collect();

        Self {
            grn_number: receiving.grn_number,
            receiving_id: receiving.id,
            received_at: receiving.received_at,
            status: receiving.status,
            supplier,
            vehicle_plate: receiving.vehicle_plate,
            driver_name: receiving.driver_name,
            notes: receiving.notes,
            lines,
            quantity_totals,
            grand_total,
            qc_decision,
            generated_at,
        }
    }
}

/// Round a monetary amount to cents, half away from zero.
pub fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn positive(value: &Decimal) -> Result<(), validator::ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(validator::ValidationError::new("range").with_message("must be greater than zero".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(no: i32, qty: Decimal, unit: &str, price: Decimal) -> ReceivingLineResponse {
        ReceivingLineResponse {
            id: Uuid::new_v4(),
            line_no: no,
            product: "Avocado".to_string(),
            variety: Some("Hass".to_string()),
            lot_number: None,
            quantity: qty,
            unit: unit.to_string(),
            unit_price: price,
        }
    }

    fn supplier() -> SupplierResponse {
        SupplierResponse {
            id: Uuid::new_v4(),
            code: "SUP-01".to_string(),
            name: "Highland Growers".to_string(),
            contact_name: None,
            phone: None,
            email: None,
            address: None,
            produce_categories: vec!["avocado".to_string()],
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn receiving(supplier: &SupplierResponse) -> ReceivingResponse {
        ReceivingResponse {
            id: Uuid::new_v4(),
            grn_number: "GRN-20260110-0003".to_string(),
            supplier_id: supplier.id,
            supplier_name: supplier.name.clone(),
            vehicle_plate: Some("KDA123X".to_string()),
            driver_name: None,
            received_at: Utc::now(),
            status: ReceivingStatus::PendingQc,
            notes: None,
            received_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            lines: None,
        }
    }

    #[test]
    fn grn_totals_lines_and_groups_quantities_by_unit() {
        let supplier = supplier();
        let grn = GoodsReceivedNote::build(
            receiving(&supplier),
            supplier,
            vec![
                line(1, Decimal::new(1205, 1), "kg", Decimal::new(3335, 3)), // 120.5 kg @ 3.335
                line(2, Decimal::from(40), "crate", Decimal::new(1250, 2)),
                line(3, Decimal::new(795, 1), "kg", Decimal::new(300, 2)),
            ],
            Some(QcDecision::Accepted),
            Utc::now(),
        );

        // 120.5 * 3.335 = 401.8675 -> 401.87
        assert_eq!(grn.lines[0].line_total, Decimal::new(40187, 2));
        assert_eq!(grn.lines[1].line_total, Decimal::new(50000, 2));
        assert_eq!(grn.lines[2].line_total, Decimal::new(23850, 2));
        assert_eq!(grn.grand_total, Decimal::new(114037, 2));
        assert_eq!(grn.quantity_totals["kg"], Decimal::from(200));
        assert_eq!(grn.quantity_totals["crate"], Decimal::from(40));
        assert_eq!(grn.grn_number, "GRN-20260110-0003");
    }

    #[test]
    fn receiving_requires_lines_with_positive_quantity() {
        let req: CreateReceivingRequest = serde_json::from_value(serde_json::json!({
            "supplier_id": Uuid::new_v4(),
            "lines": []
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreateReceivingRequest = serde_json::from_value(serde_json::json!({
            "supplier_id": Uuid::new_v4(),
            "lines": [{ "product": "Mango", "quantity": "0", "unit": "kg" }]
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreateReceivingRequest = serde_json::from_value(serde_json::json!({
            "supplier_id": Uuid::new_v4(),
            "lines": [{ "product": "Mango", "quantity": "12.5", "unit": "kg", "unit_price": "1.10" }]
        }))
        .unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn invalid_line_is_reported_under_its_index() {
        let req: CreateReceivingRequest = serde_json::from_value(serde_json::json!({
            "supplier_id": Uuid::new_v4(),
            "lines": [
                { "product": "Mango", "quantity": "3", "unit": "kg" },
                { "product": "", "quantity": "3", "unit": "kg" }
            ]
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        match errors.errors().get("lines") {
            Some(validator::ValidationErrorsKind::List(items)) => {
                assert!(items.contains_key(&1));
                assert!(!items.contains_key(&0));
            }
            other => panic!("unexpected errors for lines: {other:?}"),
        }
    }

    #[test]
    fn qc_decisions_drive_receiving_status() {
        assert_eq!(ReceivingStatus::from(QcDecision::Rejected), ReceivingStatus::Rejected);
        assert_eq!(ReceivingStatus::from_db("on_hold"), ReceivingStatus::OnHold);
        assert_eq!(ReceivingStatus::from_db("garbage"), ReceivingStatus::PendingQc);
    }
}
