use std::str::FromStr;

use alloy::primitives::{Address, U256};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::{DbErr, Set, SqlErr};

use crate::auth::AuthUser;
use crate::entities::mint_orders::{self, MintOrderStatus};
use crate::models::mint_order::{
    is_hex_tx_hash, parse_decimal_amount_to_wei, ConfirmMintOrderRequest, CreateMintOrderRequest,
    ErrorResponse, MintOrderEnvelope,
};
use crate::repos::{character_repo, mint_order_repo};
use crate::services::mint_order::{confirm_order_with_tx, ConfirmOutcome};
use crate::AppState;

/// Map a database error to a response. A unique violation here can only be
/// the tx_hash index, meaning the hash is already attached to another order.
pub(crate) fn db_error(e: DbErr) -> (StatusCode, Json<ErrorResponse>) {
    if let Some(SqlErr::UniqueConstraintViolation(_)) = e.sql_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "transaction hash already used by another order",
            )),
        );
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(format!("Database error: {}", e))),
    )
}

fn bad_request(msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(msg)))
}

pub async fn create_mint_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateMintOrderRequest>,
) -> Result<Json<MintOrderEnvelope>, (StatusCode, Json<ErrorResponse>)> {
    if req.chain_id <= 0 {
        return Err(bad_request("invalid chain id"));
    }
    if Address::from_str(&req.token_address).is_err() {
        return Err(bad_request("invalid token address"));
    }
    if req.token_symbol.trim().is_empty() {
        return Err(bad_request("token symbol is required"));
    }

    let token_amount_wei = match &req.token_amount_wei {
        Some(wei) => {
            let wei = wei.trim();
            if U256::from_str_radix(wei, 10).is_err() {
                return Err(bad_request("invalid token amount wei"));
            }
            wei.to_string()
        }
        None => parse_decimal_amount_to_wei(&req.token_amount, 18)
            .ok_or_else(|| bad_request("invalid token amount"))?,
    };

    let character = character_repo::find_by_id(&state.db, req.character_id)
        .await
        .map_err(db_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("character not found")),
        ))?;
    if character.user_id != user.id {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("character belongs to another user")),
        ));
    }

    if let Some(confirmed) =
        mint_order_repo::find_confirmed_for_character(&state.db, user.id, req.character_id)
            .await
            .map_err(db_error)?
    {
        return Ok(Json(MintOrderEnvelope {
            already_paid: true,
            order: confirmed,
        }));
    }

    // Reuse an open order instead of stacking duplicates.
    if let Some(open) =
        mint_order_repo::find_open_for_character(&state.db, user.id, req.character_id)
            .await
            .map_err(db_error)?
    {
        return Ok(Json(MintOrderEnvelope {
            already_paid: false,
            order: open,
        }));
    }

    let treasury = state.config.treasury_wallet.as_str();
    if Address::from_str(treasury).is_err() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("treasury wallet not configured")),
        ));
    }

    let order = mint_order_repo::create(
        &state.db,
        mint_orders::ActiveModel {
            user_id: Set(user.id),
            character_id: Set(req.character_id),
            status: Set(MintOrderStatus::Pending),
            chain_id: Set(req.chain_id),
            token_address: Set(req.token_address.to_lowercase()),
            token_symbol: Set(req.token_symbol.trim().to_string()),
            token_amount: Set(req.token_amount.trim().to_string()),
            token_amount_wei: Set(token_amount_wei),
            treasury_wallet: Set(treasury.to_lowercase()),
            payer_wallet: Set(Some(user.wallet_address.clone())),
            ..Default::default()
        },
    )
    .await
    .map_err(db_error)?;

    tracing::info!(
        order_id = order.id,
        order_no = %order.order_no,
        user_id = user.id,
        character_id = req.character_id,
        "mint order created"
    );

    Ok(Json(MintOrderEnvelope {
        already_paid: false,
        order,
    }))
}

pub async fn confirm_mint_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<i64>,
    Json(req): Json<ConfirmMintOrderRequest>,
) -> Result<Json<mint_orders::Model>, (StatusCode, Json<ErrorResponse>)> {
    let tx_hash = req.tx_hash.trim().to_lowercase();
    if !is_hex_tx_hash(&tx_hash) {
        return Err(bad_request("invalid transaction hash"));
    }

    let order = mint_order_repo::find_by_id_and_user(&state.db, order_id, user.id)
        .await
        .map_err(db_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("mint order not found")),
        ))?;

    let outcome = confirm_order_with_tx(
        &state.db,
        &state.verifier,
        order,
        &tx_hash,
        &user.wallet_address,
    )
    .await
    .map_err(db_error)?;

    match outcome {
        ConfirmOutcome::AlreadyConfirmed(order) | ConfirmOutcome::Confirmed(order) => {
            Ok(Json(order))
        }
        ConfirmOutcome::Verifying(order, reason) => {
            tracing::info!(
                order_id = order.id,
                reason = %reason,
                "mint order queued for background verification"
            );
            Ok(Json(order))
        }
        ConfirmOutcome::Failed(order, reason) => {
            tracing::warn!(order_id = order.id, reason = %reason, "mint order failed verification");
            Err(bad_request(&reason))
        }
        ConfirmOutcome::IllegalState => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                "order cannot be confirmed in its current state",
            )),
        )),
    }
}

pub async fn get_mint_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<i64>,
) -> Result<Json<MintOrderEnvelope>, (StatusCode, Json<ErrorResponse>)> {
    let order = mint_order_repo::find_by_id_and_user(&state.db, order_id, user.id)
        .await
        .map_err(db_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("mint order not found")),
        ))?;

    Ok(Json(MintOrderEnvelope {
        already_paid: order.status == MintOrderStatus::Confirmed,
        order,
    }))
}
