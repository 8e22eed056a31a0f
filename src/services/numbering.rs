//! Per-tenant daily document numbers.
//!
//! Numbers are allocated inside the caller's transaction under an advisory
//! lock keyed by tenant, sequence and day, so concurrent requests for the
//! same day serialize and never hand out the same number twice.

use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::numbering::{daily_code, daily_prefix};
use crate::domain::receiving::GRN_PREFIX;
use crate::domain::visitors::BADGE_PREFIX;

#[derive(Debug, Clone, Copy)]
pub enum Sequence {
    Grn,
    VisitorBadge,
}

impl Sequence {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Grn => GRN_PREFIX,
            Self::VisitorBadge => BADGE_PREFIX,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Self::Grn => {
                "SELECT COALESCE(MAX(CAST(split_part(grn_number, '-', 3) AS BIGINT)), 0) \
                 FROM receivings WHERE tenant_id = $1 AND grn_number LIKE $2"
            }
            Self::VisitorBadge => {
                "SELECT COALESCE(MAX(CAST(split_part(badge_number, '-', 3) AS BIGINT)), 0) \
                 FROM visitors WHERE tenant_id = $1 AND badge_number LIKE $2"
            }
        }
    }
}

/// Allocate the next number of `sequence` for `date`. Must run inside a transaction.
pub async fn next_daily_code(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    sequence: Sequence,
    date: NaiveDate,
) -> Result<String, sqlx::Error> {
    let prefix = daily_prefix(sequence.prefix(), date);

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("{}:{}", tenant_id, prefix))
        .execute(&mut *conn)
        .await?;

    let last: i64 = sqlx::query_scalar(sequence.sql())
        .bind(tenant_id)
        .bind(format!("{}%", prefix))
        .fetch_one(&mut *conn)
        .await?;

    Ok(daily_code(sequence.prefix(), date, last + 1))
}
