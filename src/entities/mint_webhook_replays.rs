//! SeaORM entity for the mint_webhook_replays table.
//!
//! Write-once dedup keys for webhook deliveries. Rows are only ever
//! inserted (on-conflict-do-nothing) and expired, never updated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mint_webhook_replays")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub replay_key: String,
    pub expires_at: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
