//! Mint order persistence helpers.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::mint_orders::{self, MintOrderStatus};
use crate::entities::prelude::MintOrders;

/// Generate a unique human-readable order number, e.g. "MO-1F0A...".
pub fn generate_order_no() -> String {
    format!("MO-{}", Uuid::new_v4().simple()).to_uppercase()
}

pub async fn create(
    db: &DatabaseConnection,
    mut order: mint_orders::ActiveModel,
) -> Result<mint_orders::Model, DbErr> {
    let now = Utc::now();
    order.order_no = Set(generate_order_no());
    order.created_at = Set(now.into());
    order.updated_at = Set(now.into());
    order.insert(db).await
}

pub async fn find_by_id(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Option<mint_orders::Model>, DbErr> {
    MintOrders::find_by_id(order_id).one(db).await
}

pub async fn find_by_id_and_user(
    db: &DatabaseConnection,
    order_id: i64,
    user_id: i64,
) -> Result<Option<mint_orders::Model>, DbErr> {
    MintOrders::find()
        .filter(mint_orders::Column::Id.eq(order_id))
        .filter(mint_orders::Column::UserId.eq(user_id))
        .one(db)
        .await
}

pub async fn find_by_order_no(
    db: &DatabaseConnection,
    order_no: &str,
) -> Result<Option<mint_orders::Model>, DbErr> {
    MintOrders::find()
        .filter(mint_orders::Column::OrderNo.eq(order_no))
        .one(db)
        .await
}

/// The confirmed order for (user, character), if any. At most one exists.
pub async fn find_confirmed_for_character(
    db: &DatabaseConnection,
    user_id: i64,
    character_id: i64,
) -> Result<Option<mint_orders::Model>, DbErr> {
    MintOrders::find()
        .filter(mint_orders::Column::UserId.eq(user_id))
        .filter(mint_orders::Column::CharacterId.eq(character_id))
        .filter(mint_orders::Column::Status.eq(MintOrderStatus::Confirmed))
        .order_by(mint_orders::Column::Id, Order::Desc)
        .one(db)
        .await
}

/// The latest still-open (pending or verifying) order for (user, character),
/// returned instead of creating a duplicate.
pub async fn find_open_for_character(
    db: &DatabaseConnection,
    user_id: i64,
    character_id: i64,
) -> Result<Option<mint_orders::Model>, DbErr> {
    MintOrders::find()
        .filter(mint_orders::Column::UserId.eq(user_id))
        .filter(mint_orders::Column::CharacterId.eq(character_id))
        .filter(
            mint_orders::Column::Status
                .is_in([MintOrderStatus::Pending, MintOrderStatus::Verifying]),
        )
        .order_by(mint_orders::Column::Id, Order::Desc)
        .one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_no_is_prefixed_and_unique_enough() {
        let a = generate_order_no();
        let b = generate_order_no();
        assert!(a.starts_with("MO-"));
        assert_eq!(a.len(), 35);
        assert_ne!(a, b);
    }
}
