//! Indexer webhook ingestion.
//!
//! Deliveries are authenticated with an HMAC-SHA256 signature over
//! `"{timestamp}.{raw body}"`, bounded by a timestamp skew window, and
//! deduplicated through a persisted replay key before any order state is
//! touched. The body is taken raw (`Bytes`) because the signature covers
//! the exact wire bytes, not a re-serialization.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

use crate::handlers::mint_order::db_error;
use crate::models::mint_order::{is_hex_tx_hash, ErrorResponse, WebhookConfirmRequest};
use crate::repos::{mint_order_repo, webhook_replay_repo};
use crate::services::mint_order::{confirm_order_with_tx, ConfirmOutcome};
use crate::AppState;

pub const WEBHOOK_ID_HEADER: &str = "x-webhook-id";
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "x-webhook-timestamp";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";

/// How long a delivery id is remembered for replay rejection.
const REPLAY_KEY_TTL_HOURS: i64 = 24;

type HmacSha256 = Hmac<Sha256>;

/// Constant-time check of a hex HMAC-SHA256 signature over
/// `"{timestamp}.{body}"`. A leading `0x` on the signature is tolerated.
fn verify_signature(secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    let sig_hex = signature.strip_prefix("0x").unwrap_or(signature);
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.verify_slice(&sig_bytes).is_ok()
}

fn timestamp_within_skew(timestamp: i64, now: i64, max_skew_secs: i64) -> bool {
    (now - timestamp).abs() <= max_skew_secs
}

fn unauthorized(msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(msg)))
}

pub async fn confirm_via_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<ErrorResponse>)> {
    let secret = state.config.webhook_secret.as_str();
    if secret.is_empty() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("webhook secret not configured")),
        ));
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let delivery_id =
        header(WEBHOOK_ID_HEADER).ok_or_else(|| unauthorized("missing webhook id"))?;
    let timestamp =
        header(WEBHOOK_TIMESTAMP_HEADER).ok_or_else(|| unauthorized("missing timestamp"))?;
    let signature =
        header(WEBHOOK_SIGNATURE_HEADER).ok_or_else(|| unauthorized("missing signature"))?;

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| unauthorized("invalid timestamp"))?;
    if !timestamp_within_skew(ts, Utc::now().timestamp(), state.config.webhook_max_skew_secs) {
        return Err(unauthorized("timestamp outside allowed window"));
    }

    if !verify_signature(secret, &timestamp, &body, &signature) {
        tracing::warn!(delivery_id = %delivery_id, "webhook signature rejected");
        return Err(unauthorized("invalid signature"));
    }

    // Dedup before touching order state; at-least-once transports redeliver.
    let replay_key = format!("mint_webhook:{}", delivery_id);
    let first_delivery = webhook_replay_repo::register_replay_key(
        &state.db,
        &replay_key,
        Duration::hours(REPLAY_KEY_TTL_HOURS),
    )
    .await
    .map_err(db_error)?;
    if !first_delivery {
        tracing::info!(delivery_id = %delivery_id, "duplicate webhook delivery ignored");
        return Ok(Json(json!({ "status": "ignored" })));
    }

    if let Err(e) = webhook_replay_repo::cleanup_expired(&state.db).await {
        tracing::warn!(error = %e, "webhook replay cleanup failed");
    }

    let req: WebhookConfirmRequest = serde_json::from_slice(&body).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("invalid webhook payload")),
        )
    })?;

    let tx_hash = req.tx_hash.trim().to_lowercase();
    if !is_hex_tx_hash(&tx_hash) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("invalid transaction hash")),
        ));
    }

    let order = match (req.order_id, req.order_no.as_deref()) {
        (Some(id), _) => mint_order_repo::find_by_id(&state.db, id).await,
        (None, Some(no)) => mint_order_repo::find_by_order_no(&state.db, no).await,
        (None, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("order_id or order_no is required")),
            ))
        }
    }
    .map_err(db_error)?
    .ok_or((
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("mint order not found")),
    ))?;

    let Some(payer_wallet) = order.payer_wallet.clone().filter(|w| !w.is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("order has no payer wallet on record")),
        ));
    };

    let order_id = order.id;
    let outcome = confirm_order_with_tx(&state.db, &state.verifier, order, &tx_hash, &payer_wallet)
        .await
        .map_err(db_error)?;

    if let ConfirmOutcome::Failed(_, reason) = &outcome {
        tracing::warn!(order_id = order_id, reason = %reason, "webhook confirmation failed");
    }
    outcome_response(outcome).map(Json)
}

/// Map a confirmation outcome to the webhook response. Verdicts mirror the
/// synchronous confirm handler: permanent failures are 400 with the
/// persisted reason, an illegal transition is 409, never a silent 200.
fn outcome_response(
    outcome: ConfirmOutcome,
) -> Result<Value, (StatusCode, Json<ErrorResponse>)> {
    match outcome {
        ConfirmOutcome::AlreadyConfirmed(_) => Ok(json!({ "status": "already_confirmed" })),
        ConfirmOutcome::Confirmed(_) => Ok(json!({ "status": "confirmed" })),
        ConfirmOutcome::Verifying(_, reason) => {
            Ok(json!({ "status": "verifying", "reason": reason }))
        }
        ConfirmOutcome::Failed(_, reason) => {
            Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(reason))))
        }
        ConfirmOutcome::IllegalState => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                "order cannot be confirmed in its current state",
            )),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::mint_orders::{self, MintOrderStatus};

    fn order(status: MintOrderStatus) -> mint_orders::Model {
        let now = Utc::now().into();
        mint_orders::Model {
            id: 1,
            order_no: "MO-TEST".into(),
            user_id: 1,
            character_id: 1,
            status,
            chain_id: 8453,
            token_address: "0x0000000000000000000000000000000000000001".into(),
            token_symbol: "USDC".into(),
            token_amount: "1".into(),
            token_amount_wei: "1000000000000000000".into(),
            treasury_wallet: "0x0000000000000000000000000000000000000002".into(),
            tx_hash: None,
            payer_wallet: None,
            block_number: None,
            verified_at: None,
            fail_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn confirmed_outcomes_are_2xx() {
        let ok = outcome_response(ConfirmOutcome::Confirmed(order(MintOrderStatus::Confirmed)))
            .unwrap();
        assert_eq!(ok["status"], "confirmed");

        let ok = outcome_response(ConfirmOutcome::AlreadyConfirmed(order(
            MintOrderStatus::Confirmed,
        )))
        .unwrap();
        assert_eq!(ok["status"], "already_confirmed");
    }

    #[test]
    fn temporary_failure_reports_verifying() {
        let ok = outcome_response(ConfirmOutcome::Verifying(
            order(MintOrderStatus::Verifying),
            "tx not found on chain".into(),
        ))
        .unwrap();
        assert_eq!(ok["status"], "verifying");
        assert_eq!(ok["reason"], "tx not found on chain");
    }

    #[test]
    fn permanent_failure_is_a_400_with_the_reason() {
        let (status, body) = outcome_response(ConfirmOutcome::Failed(
            order(MintOrderStatus::Failed),
            "tx execution reverted on chain".into(),
        ))
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "tx execution reverted on chain");
    }

    #[test]
    fn illegal_transition_is_a_409_not_a_silent_200() {
        let (status, _) = outcome_response(ConfirmOutcome::IllegalState).unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_accepted() {
        let body = br#"{"order_id":1,"tx_hash":"0xab"}"#;
        let sig = sign("topsecret", "1700000000", body);
        assert!(verify_signature("topsecret", "1700000000", body, &sig));
    }

    #[test]
    fn zero_x_prefixed_signature_accepted() {
        let body = b"payload";
        let sig = format!("0x{}", sign("s", "42", body));
        assert!(verify_signature("s", "42", body, &sig));
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = b"payload";
        let sig = sign("right", "42", body);
        assert!(!verify_signature("wrong", "42", body, &sig));
    }

    #[test]
    fn tampered_body_rejected() {
        let sig = sign("s", "42", b"original");
        assert!(!verify_signature("s", "42", b"tampered", &sig));
    }

    #[test]
    fn tampered_timestamp_rejected() {
        let sig = sign("s", "42", b"body");
        assert!(!verify_signature("s", "43", b"body", &sig));
    }

    #[test]
    fn malformed_hex_rejected() {
        assert!(!verify_signature("s", "42", b"body", "not-hex"));
        assert!(!verify_signature("s", "42", b"body", ""));
    }

    #[test]
    fn skew_window() {
        assert!(timestamp_within_skew(1000, 1000, 300));
        assert!(timestamp_within_skew(1000, 1300, 300));
        assert!(timestamp_within_skew(1300, 1000, 300));
        assert!(!timestamp_within_skew(1000, 1301, 300));
        assert!(!timestamp_within_skew(1301, 1000, 300));
    }
}
