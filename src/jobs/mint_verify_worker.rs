//! Background verification worker.
//!
//! Every tick: recover jobs stuck in running (worker crash), claim a
//! batch of due pending jobs with SKIP LOCKED, verify each against the
//! chain, and prune finished jobs past retention. Safe to run on several
//! instances at once; the claim transaction is the mutual exclusion.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DbErr, IntoActiveModel, Set};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::entities::mint_orders::MintOrderStatus;
use crate::entities::mint_verify_jobs::{self, MintVerifyJobStatus};
use crate::repos::{mint_order_repo, verify_job_repo};
use crate::services::mint_order::{finalize_order_by_tx, FinalizeOutcome};
use crate::AppState;

const WORKER_TICK_SECS: u64 = 8;
const CLAIM_BATCH_SIZE: u64 = 12;
/// A job running longer than this is assumed orphaned by a dead worker.
const STALE_LOCK_SECS: i64 = 120;
const RETRY_BACKOFF_SECS: i64 = 10;
/// Backoff when the order row or its payer wallet is missing; likely
/// replication lag or a confirm still in flight.
const MISSING_DATA_BACKOFF_SECS: i64 = 30;
const FINISHED_RETENTION_HOURS: i64 = 72;

/// Spawn the worker loop. Dropping or sending on the returned channel
/// stops it.
pub fn spawn(state: AppState) -> watch::Sender<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(run(state, shutdown_rx));
    shutdown_tx
}

async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    info!(
        tick_secs = WORKER_TICK_SECS,
        batch = CLAIM_BATCH_SIZE,
        "mint verify worker started"
    );
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(WORKER_TICK_SECS));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_tick(&state).await {
                    error!(error = %e, "verify worker tick failed");
                }
            }
            _ = shutdown.changed() => {
                info!("mint verify worker stopping");
                return;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("mint verify worker received ctrl-c, stopping");
                return;
            }
        }
    }
}

/// One worker pass. Public so tests and one-shot maintenance commands can
/// drive the queue without the timer loop.
pub async fn run_tick(state: &AppState) -> Result<(), DbErr> {
    let now = Utc::now();

    let unlocked =
        verify_job_repo::unlock_stale_running(&state.db, now - Duration::seconds(STALE_LOCK_SECS))
            .await?;
    if unlocked > 0 {
        warn!(count = unlocked, "unlocked stale running verify jobs");
    }

    let jobs = verify_job_repo::claim_due(&state.db, CLAIM_BATCH_SIZE, now).await?;
    if !jobs.is_empty() {
        debug!(count = jobs.len(), "claimed verify jobs");
    }
    for job in jobs {
        if let Err(e) = process_job(state, job).await {
            error!(error = %e, "verify job processing failed");
        }
    }

    let removed = verify_job_repo::cleanup_finished(
        &state.db,
        now - Duration::hours(FINISHED_RETENTION_HOURS),
    )
    .await?;
    if removed > 0 {
        debug!(count = removed, "pruned finished verify jobs");
    }

    Ok(())
}

async fn process_job(state: &AppState, job: mint_verify_jobs::Model) -> Result<(), DbErr> {
    let order_id = job.order_id;

    let Some(order) = mint_order_repo::find_by_id(&state.db, order_id).await? else {
        verify_job_repo::reschedule_or_dead(
            &state.db,
            order_id,
            Utc::now() + Duration::seconds(MISSING_DATA_BACKOFF_SECS),
            "order not found",
        )
        .await?;
        return Ok(());
    };

    // Another path (webhook, client confirm) may have finished first.
    if order.status == MintOrderStatus::Confirmed {
        verify_job_repo::mark_done(&state.db, order_id).await?;
        return Ok(());
    }

    let order = if order.status.can_transition(MintOrderStatus::Verifying)
        && order.status != MintOrderStatus::Verifying
    {
        let mut active = order.into_active_model();
        active.status = Set(MintOrderStatus::Verifying);
        active.updated_at = Set(Utc::now().into());
        active.update(&state.db).await?
    } else {
        order
    };

    let payer_wallet = if !job.payer_wallet.is_empty() {
        job.payer_wallet.clone()
    } else if let Some(wallet) = order.payer_wallet.clone().filter(|w| !w.is_empty()) {
        wallet
    } else {
        verify_job_repo::reschedule_or_dead(
            &state.db,
            order_id,
            Utc::now() + Duration::seconds(MISSING_DATA_BACKOFF_SECS),
            "missing payer wallet",
        )
        .await?;
        return Ok(());
    };

    match finalize_order_by_tx(&state.db, &state.verifier, order, &job.tx_hash, &payer_wallet)
        .await?
    {
        FinalizeOutcome::Confirmed(_) => {
            verify_job_repo::mark_done(&state.db, order_id).await?;
        }
        FinalizeOutcome::Retrying(_, reason) => {
            let status = verify_job_repo::reschedule_or_dead(
                &state.db,
                order_id,
                Utc::now() + Duration::seconds(RETRY_BACKOFF_SECS),
                &reason,
            )
            .await?;
            if status == Some(MintVerifyJobStatus::Dead) {
                warn!(order_id = order_id, reason = %reason, "verify job dead-lettered after retry ceiling");
            }
        }
        FinalizeOutcome::Failed(_, reason) => {
            verify_job_repo::mark_dead(&state.db, order_id, &reason).await?;
            info!(order_id = order_id, reason = %reason, "verify job dead-lettered, permanent failure");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_backs_off_longer_than_a_plain_retry() {
        assert_eq!(RETRY_BACKOFF_SECS, 10);
        assert_eq!(MISSING_DATA_BACKOFF_SECS, 30);
        assert!(MISSING_DATA_BACKOFF_SECS > RETRY_BACKOFF_SECS);
    }

    #[test]
    fn stale_lock_outlives_several_ticks() {
        assert!(STALE_LOCK_SECS as u64 > 2 * WORKER_TICK_SECS);
    }
}
