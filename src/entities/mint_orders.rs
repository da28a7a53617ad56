//! SeaORM entity for the mint_orders table.
//!
//! A mint order gates one character unlock behind a verified on-chain
//! payment. Status moves only along the transitions in
//! [`MintOrderStatus::can_transition`].

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mint_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    pub character_id: i64,
    pub status: MintOrderStatus,
    pub chain_id: i64,
    pub token_address: String,
    pub token_symbol: String,
    /// Human-readable amount, e.g. "1.5"
    pub token_amount: String,
    /// Base-unit amount as a decimal string (arbitrary precision)
    pub token_amount_wei: String,
    pub treasury_wallet: String,
    pub tx_hash: Option<String>,
    pub payer_wallet: Option<String>,
    pub block_number: Option<i64>,
    pub verified_at: Option<DateTimeWithTimeZone>,
    pub fail_reason: Option<String>,
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
pub enum MintOrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "verifying")]
    Verifying,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl MintOrderStatus {
    /// Legal status transitions. `confirmed` is absorbing except for the
    /// idempotent re-confirmation no-op; `failed` is re-enterable so a new
    /// tx hash can restart verification.
    pub fn can_transition(self, to: MintOrderStatus) -> bool {
        use MintOrderStatus::*;
        matches!(
            (self, to),
            (Pending, Verifying)
                | (Pending, Confirmed)
                | (Pending, Failed)
                | (Verifying, Confirmed)
                | (Verifying, Failed)
                | (Failed, Verifying)
                | (Failed, Failed)
                | (Confirmed, Confirmed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::MintOrderStatus::*;

    #[test]
    fn pending_can_start_verification() {
        assert!(Pending.can_transition(Verifying));
        assert!(Pending.can_transition(Confirmed));
        assert!(Pending.can_transition(Failed));
    }

    #[test]
    fn verifying_resolves_but_never_regresses() {
        assert!(Verifying.can_transition(Confirmed));
        assert!(Verifying.can_transition(Failed));
        assert!(!Verifying.can_transition(Pending));
        assert!(!Verifying.can_transition(Verifying));
    }

    #[test]
    fn failed_is_retryable() {
        assert!(Failed.can_transition(Verifying));
        assert!(Failed.can_transition(Failed));
        assert!(!Failed.can_transition(Confirmed));
        assert!(!Failed.can_transition(Pending));
    }

    #[test]
    fn confirmed_is_terminal_except_idempotent_reconfirm() {
        assert!(Confirmed.can_transition(Confirmed));
        assert!(!Confirmed.can_transition(Pending));
        assert!(!Confirmed.can_transition(Verifying));
        assert!(!Confirmed.can_transition(Failed));
    }
}
