//! Webhook replay key persistence.

use chrono::{Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::mint_webhook_replays::{self};
use crate::entities::prelude::MintWebhookReplays;

/// Register a delivery id as seen. Insert-or-ignore on the unique
/// replay_key; exactly one row affected means this is the first delivery,
/// zero means a duplicate to be ignored. This is the idempotency boundary
/// for at-least-once webhook transports.
pub async fn register_replay_key(
    db: &DatabaseConnection,
    replay_key: &str,
    ttl: Duration,
) -> Result<bool, DbErr> {
    let now = Utc::now();
    let record = mint_webhook_replays::ActiveModel {
        replay_key: Set(replay_key.to_string()),
        expires_at: Set((now + ttl).into()),
        created_at: Set(now.into()),
        ..Default::default()
    };

    let rows = MintWebhookReplays::insert(record)
        .on_conflict(
            OnConflict::column(mint_webhook_replays::Column::ReplayKey)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(rows == 1)
}

/// Drop keys past their TTL. Called opportunistically from the webhook
/// path; losing a run only delays cleanup.
pub async fn cleanup_expired(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let res = MintWebhookReplays::delete_many()
        .filter(mint_webhook_replays::Column::ExpiresAt.lte(Utc::now()))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}
