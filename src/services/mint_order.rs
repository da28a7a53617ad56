//! Order finalization shared by every confirmation path.
//!
//! The client confirm handler, the indexer webhook, and the verify worker
//! all funnel through [`finalize_order_by_tx`] so that what counts as
//! success or failure can never diverge between entry points. This module
//! and the claim path in `verify_job_repo` are the only writers of order
//! and job status.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, IntoActiveModel, Set};
use tracing::{info, warn};

use crate::entities::mint_orders::{self, MintOrderStatus};
use crate::repos::{character_repo, verify_job_repo};
use crate::services::verifier::{MintTxVerifier, VerifyError};

/// Delay before the first background retry after a temporary failure on
/// the synchronous path; long enough for most txs to propagate.
const FIRST_RETRY_DELAY_SECS: i64 = 6;

/// What finalization did to the order.
#[derive(Debug)]
pub enum FinalizeOutcome {
    /// Verifier succeeded; order is confirmed.
    Confirmed(mint_orders::Model),
    /// Temporary verification failure; order is verifying and the caller
    /// is responsible for enqueueing a retry job.
    Retrying(mint_orders::Model, String),
    /// Permanent verification failure; order is failed.
    Failed(mint_orders::Model, String),
}

/// Outcome of attaching a tx hash to an order and running one bounded
/// verification attempt.
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// Order was already confirmed; duplicate confirmations are no-ops.
    AlreadyConfirmed(mint_orders::Model),
    Confirmed(mint_orders::Model),
    /// Temporary failure; a retry job has been enqueued.
    Verifying(mint_orders::Model, String),
    Failed(mint_orders::Model, String),
    /// The order cannot legally enter verification from its current status.
    IllegalState,
}

/// Run the verifier for `tx_hash` and persist the outcome on the order.
///
/// Every cross-cutting update (status plus evidence fields) is written in
/// a single UPDATE so concurrent readers never observe a partial state.
pub async fn finalize_order_by_tx(
    db: &DatabaseConnection,
    verifier: &MintTxVerifier,
    order: mint_orders::Model,
    tx_hash: &str,
    payer_wallet: &str,
) -> Result<FinalizeOutcome, DbErr> {
    let status = order.status;
    let character_id = order.character_id;
    let order_id = order.id;

    match verifier.verify(tx_hash, payer_wallet, &order).await {
        Ok(verified) => {
            let mut active = order.into_active_model();
            if status.can_transition(MintOrderStatus::Confirmed) {
                active.status = Set(MintOrderStatus::Confirmed);
            }
            active.tx_hash = Set(Some(tx_hash.to_lowercase()));
            active.payer_wallet = Set(Some(payer_wallet.to_lowercase()));
            active.block_number = Set(i64::try_from(verified.block_number).ok());
            active.verified_at = Set(Some(Utc::now().into()));
            active.fail_reason = Set(None);
            active.updated_at = Set(Utc::now().into());
            let order = active.update(db).await?;

            info!(
                order_id = order_id,
                block_number = verified.block_number,
                token_id = verified.token_id,
                "mint order confirmed"
            );

            // Best effort; a failed annotation never rolls back the order.
            match i64::try_from(verified.token_id) {
                Ok(token_id) => {
                    if let Err(e) =
                        character_repo::set_onchain_token_id(db, character_id, token_id).await
                    {
                        warn!(
                            character_id = character_id,
                            error = %e,
                            "failed to annotate character with minted token id"
                        );
                    }
                }
                Err(_) => warn!(
                    character_id = character_id,
                    "minted token id does not fit i64, skipping annotation"
                ),
            }

            Ok(FinalizeOutcome::Confirmed(order))
        }
        Err(verify_err) => {
            let reason = verify_err.reason().to_string();
            let mut active = order.into_active_model();
            if verify_err.is_temporary() {
                if status.can_transition(MintOrderStatus::Verifying) {
                    active.status = Set(MintOrderStatus::Verifying);
                }
                active.fail_reason = Set(Some(format!("verification pending: {}", reason)));
            } else {
                if status.can_transition(MintOrderStatus::Failed) {
                    active.status = Set(MintOrderStatus::Failed);
                }
                active.fail_reason = Set(Some(reason.clone()));
            }
            active.tx_hash = Set(Some(tx_hash.to_lowercase()));
            active.updated_at = Set(Utc::now().into());
            let order = active.update(db).await?;

            match verify_err {
                VerifyError::Temporary(_) => Ok(FinalizeOutcome::Retrying(order, reason)),
                VerifyError::Permanent(_) => Ok(FinalizeOutcome::Failed(order, reason)),
            }
        }
    }
}

/// Attach a tx hash to an order and run one verification attempt.
///
/// Shared by the client confirm handler and the webhook handler. On a
/// temporary failure the retry job is enqueued here so both paths behave
/// identically.
pub async fn confirm_order_with_tx(
    db: &DatabaseConnection,
    verifier: &MintTxVerifier,
    order: mint_orders::Model,
    tx_hash: &str,
    payer_wallet: &str,
) -> Result<ConfirmOutcome, DbErr> {
    if order.status == MintOrderStatus::Confirmed {
        return Ok(ConfirmOutcome::AlreadyConfirmed(order));
    }
    if !order.status.can_transition(MintOrderStatus::Verifying) {
        return Ok(ConfirmOutcome::IllegalState);
    }

    let order_id = order.id;
    let mut active = order.into_active_model();
    active.status = Set(MintOrderStatus::Verifying);
    active.tx_hash = Set(Some(tx_hash.to_lowercase()));
    active.fail_reason = Set(None);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(db).await?;

    match finalize_order_by_tx(db, verifier, order, tx_hash, payer_wallet).await? {
        FinalizeOutcome::Confirmed(order) => Ok(ConfirmOutcome::Confirmed(order)),
        FinalizeOutcome::Retrying(order, reason) => {
            verify_job_repo::upsert_pending(
                db,
                order_id,
                tx_hash,
                payer_wallet,
                &reason,
                Utc::now() + Duration::seconds(FIRST_RETRY_DELAY_SECS),
            )
            .await?;
            Ok(ConfirmOutcome::Verifying(order, reason))
        }
        FinalizeOutcome::Failed(order, reason) => Ok(ConfirmOutcome::Failed(order, reason)),
    }
}
