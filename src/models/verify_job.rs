//! Response shapes for the admin verify-job endpoints.

use serde::Serialize;

use crate::entities::mint_verify_jobs;

/// Queue depth per status. Absent statuses are reported as zero so
/// dashboards get a stable shape.
#[derive(Debug, Serialize)]
pub struct VerifyJobStatsResponse {
    pub pending: i64,
    pub running: i64,
    pub done: i64,
    pub dead: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct VerifyJobListResponse {
    pub jobs: Vec<mint_verify_jobs::Model>,
}

#[derive(Debug, Serialize)]
pub struct ForceRetryResponse {
    pub order_id: i64,
    pub requeued: bool,
}
