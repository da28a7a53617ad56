//! Operator endpoints for the verify job queue.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;

use crate::entities::mint_verify_jobs::MintVerifyJobStatus;
use crate::handlers::mint_order::db_error;
use crate::models::mint_order::ErrorResponse;
use crate::models::verify_job::{ForceRetryResponse, VerifyJobListResponse, VerifyJobStatsResponse};
use crate::repos::verify_job_repo;
use crate::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

const DEFAULT_LIST_LIMIT: u64 = 50;
const MAX_LIST_LIMIT: u64 = 500;

/// Shared-secret gate for the admin surface. 503 when no secret is
/// configured so a blank deployment never exposes these endpoints.
fn require_admin(
    headers: &HeaderMap,
    admin_secret: &str,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if admin_secret.is_empty() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("admin access not configured")),
        ));
    }
    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != admin_secret {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("invalid admin key")),
        ));
    }
    Ok(())
}

fn parse_job_status(s: &str) -> Option<MintVerifyJobStatus> {
    match s.to_lowercase().as_str() {
        "pending" => Some(MintVerifyJobStatus::Pending),
        "running" => Some(MintVerifyJobStatus::Running),
        "done" => Some(MintVerifyJobStatus::Done),
        "dead" => Some(MintVerifyJobStatus::Dead),
        _ => None,
    }
}

pub async fn verify_job_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VerifyJobStatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&headers, &state.config.admin_secret)?;

    let counts = verify_job_repo::stats(&state.db).await.map_err(db_error)?;

    let mut resp = VerifyJobStatsResponse {
        pending: 0,
        running: 0,
        done: 0,
        dead: 0,
        total: 0,
    };
    for row in counts {
        match row.status {
            MintVerifyJobStatus::Pending => resp.pending = row.count,
            MintVerifyJobStatus::Running => resp.running = row.count,
            MintVerifyJobStatus::Done => resp.done = row.count,
            MintVerifyJobStatus::Dead => resp.dead = row.count,
        }
        resp.total += row.count;
    }
    Ok(Json(resp))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

pub async fn list_verify_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<VerifyJobListResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&headers, &state.config.admin_secret)?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(parse_job_status(s).ok_or((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("unknown job status")),
        ))?),
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);

    let jobs = verify_job_repo::list(&state.db, status, limit)
        .await
        .map_err(db_error)?;
    Ok(Json(VerifyJobListResponse { jobs }))
}

pub async fn force_retry_verify_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
) -> Result<Json<ForceRetryResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&headers, &state.config.admin_secret)?;

    let requeued = verify_job_repo::force_retry(&state.db, order_id)
        .await
        .map_err(db_error)?;
    if !requeued {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("no verify job for this order")),
        ));
    }

    tracing::info!(order_id = order_id, "verify job requeued by operator");
    Ok(Json(ForceRetryResponse {
        order_id,
        requeued,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing() {
        assert_eq!(parse_job_status("pending"), Some(MintVerifyJobStatus::Pending));
        assert_eq!(parse_job_status("DEAD"), Some(MintVerifyJobStatus::Dead));
        assert_eq!(parse_job_status("unknown"), None);
    }

    #[test]
    fn admin_gate() {
        let mut headers = HeaderMap::new();
        assert!(require_admin(&headers, "").is_err());
        assert!(require_admin(&headers, "secret").is_err());

        headers.insert(ADMIN_KEY_HEADER, "wrong".parse().unwrap());
        assert!(require_admin(&headers, "secret").is_err());

        headers.insert(ADMIN_KEY_HEADER, "secret".parse().unwrap());
        assert!(require_admin(&headers, "secret").is_ok());
    }
}
