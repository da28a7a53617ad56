//! Verify job queue persistence.
//!
//! The claim path is the only place in the system needing row-level mutual
//! exclusion: jobs are selected `FOR UPDATE SKIP LOCKED` and flipped to
//! running inside one short transaction, so two worker instances can never
//! claim the same job and the (slow, network-bound) verification itself
//! never holds a row lock.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, Order, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entities::mint_verify_jobs::{self, next_status_after_failure, MintVerifyJobStatus};
use crate::entities::prelude::MintVerifyJobs;

/// Retry ceiling for new jobs; at ~10s backoff this is ~10 minutes of
/// chain propagation slack before dead-lettering.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 60;

/// Create-or-replace the pending job for an order. The uniqueness
/// constraint on order_id guarantees at most one active job per order;
/// attempt_count deliberately survives re-enqueues so a flapping order
/// still hits the ceiling.
pub async fn upsert_pending(
    db: &DatabaseConnection,
    order_id: i64,
    tx_hash: &str,
    payer_wallet: &str,
    reason: &str,
    next_retry_at: DateTime<Utc>,
) -> Result<(), DbErr> {
    let now = Utc::now();
    let job = mint_verify_jobs::ActiveModel {
        order_id: Set(order_id),
        tx_hash: Set(tx_hash.trim().to_lowercase()),
        payer_wallet: Set(payer_wallet.trim().to_lowercase()),
        status: Set(MintVerifyJobStatus::Pending),
        attempt_count: Set(0),
        max_attempts: Set(DEFAULT_MAX_ATTEMPTS),
        next_retry_at: Set(next_retry_at.into()),
        last_error: Set(Some(reason.to_string())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    MintVerifyJobs::insert(job)
        .on_conflict(
            OnConflict::column(mint_verify_jobs::Column::OrderId)
                .update_columns([
                    mint_verify_jobs::Column::TxHash,
                    mint_verify_jobs::Column::PayerWallet,
                    mint_verify_jobs::Column::Status,
                    mint_verify_jobs::Column::NextRetryAt,
                    mint_verify_jobs::Column::LastError,
                    mint_verify_jobs::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Reset jobs stuck in running since before `stale_before` back to pending.
/// Protects against a worker process dying mid-job.
pub async fn unlock_stale_running(
    db: &DatabaseConnection,
    stale_before: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let res = MintVerifyJobs::update_many()
        .col_expr(
            mint_verify_jobs::Column::Status,
            Expr::value(MintVerifyJobStatus::Pending),
        )
        .col_expr(mint_verify_jobs::Column::NextRetryAt, Expr::value(Utc::now()))
        .filter(mint_verify_jobs::Column::Status.eq(MintVerifyJobStatus::Running))
        .filter(
            mint_verify_jobs::Column::LastTriedAt
                .is_null()
                .or(mint_verify_jobs::Column::LastTriedAt.lt(stale_before)),
        )
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

/// Atomically claim up to `limit` due pending jobs: select with
/// `FOR UPDATE SKIP LOCKED`, flip to running, stamp last_tried_at and
/// bump attempt_count, all in one transaction.
pub async fn claim_due(
    db: &DatabaseConnection,
    limit: u64,
    now: DateTime<Utc>,
) -> Result<Vec<mint_verify_jobs::Model>, DbErr> {
    let txn = db.begin().await?;

    let jobs = MintVerifyJobs::find()
        .filter(mint_verify_jobs::Column::Status.eq(MintVerifyJobStatus::Pending))
        .filter(mint_verify_jobs::Column::NextRetryAt.lte(now))
        .order_by(mint_verify_jobs::Column::NextRetryAt, Order::Asc)
        .limit(limit)
        .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
        .all(&txn)
        .await?;

    if jobs.is_empty() {
        txn.commit().await?;
        return Ok(jobs);
    }

    let ids: Vec<i64> = jobs.iter().map(|job| job.id).collect();
    MintVerifyJobs::update_many()
        .col_expr(
            mint_verify_jobs::Column::Status,
            Expr::value(MintVerifyJobStatus::Running),
        )
        .col_expr(mint_verify_jobs::Column::LastTriedAt, Expr::value(now))
        .col_expr(
            mint_verify_jobs::Column::AttemptCount,
            Expr::col(mint_verify_jobs::Column::AttemptCount).add(1),
        )
        .col_expr(mint_verify_jobs::Column::UpdatedAt, Expr::value(now))
        .filter(mint_verify_jobs::Column::Id.is_in(ids))
        .filter(mint_verify_jobs::Column::Status.eq(MintVerifyJobStatus::Pending))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(jobs)
}

pub async fn mark_done(db: &DatabaseConnection, order_id: i64) -> Result<(), DbErr> {
    MintVerifyJobs::update_many()
        .col_expr(
            mint_verify_jobs::Column::Status,
            Expr::value(MintVerifyJobStatus::Done),
        )
        .col_expr(mint_verify_jobs::Column::LastError, Expr::value(Option::<String>::None))
        .col_expr(mint_verify_jobs::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(mint_verify_jobs::Column::OrderId.eq(order_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Reschedule after a temporary failure, or dead-letter once the attempt
/// ceiling is reached. Returns the resulting status, or None when the job
/// row has vanished.
pub async fn reschedule_or_dead(
    db: &DatabaseConnection,
    order_id: i64,
    next_retry_at: DateTime<Utc>,
    error: &str,
) -> Result<Option<MintVerifyJobStatus>, DbErr> {
    let job = MintVerifyJobs::find()
        .filter(mint_verify_jobs::Column::OrderId.eq(order_id))
        .one(db)
        .await?;
    let Some(job) = job else {
        return Ok(None);
    };

    let new_status = next_status_after_failure(job.attempt_count, job.max_attempts);
    MintVerifyJobs::update_many()
        .col_expr(mint_verify_jobs::Column::Status, Expr::value(new_status))
        .col_expr(mint_verify_jobs::Column::NextRetryAt, Expr::value(next_retry_at))
        .col_expr(mint_verify_jobs::Column::LastError, Expr::value(Some(error.to_string())))
        .col_expr(mint_verify_jobs::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(mint_verify_jobs::Column::OrderId.eq(order_id))
        .exec(db)
        .await?;
    Ok(Some(new_status))
}

/// Dead-letter immediately (permanent verification failure).
pub async fn mark_dead(
    db: &DatabaseConnection,
    order_id: i64,
    error: &str,
) -> Result<(), DbErr> {
    MintVerifyJobs::update_many()
        .col_expr(
            mint_verify_jobs::Column::Status,
            Expr::value(MintVerifyJobStatus::Dead),
        )
        .col_expr(mint_verify_jobs::Column::LastError, Expr::value(Some(error.to_string())))
        .col_expr(mint_verify_jobs::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(mint_verify_jobs::Column::OrderId.eq(order_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Hard-delete finished jobs older than the retention window.
pub async fn cleanup_finished(
    db: &DatabaseConnection,
    older_than: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let res = MintVerifyJobs::delete_many()
        .filter(
            mint_verify_jobs::Column::Status
                .is_in([MintVerifyJobStatus::Done, MintVerifyJobStatus::Dead]),
        )
        .filter(mint_verify_jobs::Column::UpdatedAt.lt(older_than))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

#[derive(Debug, FromQueryResult)]
pub struct JobStatusCount {
    pub status: MintVerifyJobStatus,
    pub count: i64,
}

/// Queue depth per status, for the admin stats endpoint.
pub async fn stats(db: &DatabaseConnection) -> Result<Vec<JobStatusCount>, DbErr> {
    MintVerifyJobs::find()
        .select_only()
        .column(mint_verify_jobs::Column::Status)
        .column_as(mint_verify_jobs::Column::Id.count(), "count")
        .group_by(mint_verify_jobs::Column::Status)
        .into_model::<JobStatusCount>()
        .all(db)
        .await
}

pub async fn list(
    db: &DatabaseConnection,
    status: Option<MintVerifyJobStatus>,
    limit: u64,
) -> Result<Vec<mint_verify_jobs::Model>, DbErr> {
    let mut query = MintVerifyJobs::find();
    if let Some(status) = status {
        query = query.filter(mint_verify_jobs::Column::Status.eq(status));
    }
    query
        .order_by(mint_verify_jobs::Column::NextRetryAt, Order::Asc)
        .limit(limit)
        .all(db)
        .await
}

/// Operator escalation path: push a job (typically dead) back to pending,
/// due immediately. Returns false when no job exists for the order.
pub async fn force_retry(db: &DatabaseConnection, order_id: i64) -> Result<bool, DbErr> {
    let now = Utc::now();
    let res = MintVerifyJobs::update_many()
        .col_expr(
            mint_verify_jobs::Column::Status,
            Expr::value(MintVerifyJobStatus::Pending),
        )
        .col_expr(mint_verify_jobs::Column::NextRetryAt, Expr::value(now))
        .col_expr(mint_verify_jobs::Column::UpdatedAt, Expr::value(now))
        .filter(mint_verify_jobs::Column::OrderId.eq(order_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected > 0)
}
