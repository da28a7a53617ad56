//! SeaORM entity for the mint_verify_jobs table.
//!
//! One row per order (unique order_id). Rows cycle pending -> running ->
//! pending until the verifier succeeds (done) or the attempt ceiling or a
//! permanent failure dead-letters them (dead).

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mint_verify_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub tx_hash: String,
    pub payer_wallet: String,
    pub status: MintVerifyJobStatus,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_retry_at: DateTimeWithTimeZone,
    pub last_tried_at: Option<DateTimeWithTimeZone>,
    pub last_error: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum MintVerifyJobStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "dead")]
    Dead,
}

/// Decide where a job goes after a temporary verification failure.
/// `attempt_count` was already incremented when the job was claimed.
pub fn next_status_after_failure(attempt_count: i32, max_attempts: i32) -> MintVerifyJobStatus {
    if attempt_count >= max_attempts {
        MintVerifyJobStatus::Dead
    } else {
        MintVerifyJobStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reschedules_below_ceiling() {
        assert_eq!(next_status_after_failure(1, 60), MintVerifyJobStatus::Pending);
        assert_eq!(next_status_after_failure(59, 60), MintVerifyJobStatus::Pending);
    }

    #[test]
    fn dead_letters_at_ceiling() {
        assert_eq!(next_status_after_failure(60, 60), MintVerifyJobStatus::Dead);
        assert_eq!(next_status_after_failure(61, 60), MintVerifyJobStatus::Dead);
    }
}
