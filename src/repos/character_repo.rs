//! Minimal character lookups used by the mint subsystem.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

use crate::entities::characters;
use crate::entities::prelude::Characters;

pub async fn find_by_id(
    db: &DatabaseConnection,
    character_id: i64,
) -> Result<Option<characters::Model>, DbErr> {
    Characters::find_by_id(character_id).one(db).await
}

/// Annotate a character with the token id minted for it on chain.
pub async fn set_onchain_token_id(
    db: &DatabaseConnection,
    character_id: i64,
    token_id: i64,
) -> Result<(), DbErr> {
    Characters::update_many()
        .col_expr(characters::Column::OnchainTokenId, Expr::value(Some(token_id)))
        .filter(characters::Column::Id.eq(character_id))
        .exec(db)
        .await?;
    Ok(())
}
