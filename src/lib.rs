// src/lib.rs

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::MintConfig;
use crate::services::verifier::MintTxVerifier;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: MintConfig,
    pub verifier: Arc<MintTxVerifier>,
}

pub mod entities {
    pub mod prelude;
    pub mod characters;
    pub mod mint_orders;
    pub mod mint_verify_jobs;
    pub mod mint_webhook_replays;
}

pub mod repos {
    pub mod character_repo;
    pub mod mint_order_repo;
    pub mod verify_job_repo;
    pub mod webhook_replay_repo;
}

pub mod services {
    pub mod mint_order;
    pub mod verifier;
}

pub mod handlers {
    pub mod admin;
    pub mod mint_order;
    pub mod webhook;
}

pub mod jobs {
    pub mod mint_verify_worker;
}

pub mod models {
    pub mod mint_order;
    pub mod verify_job;
}

pub mod auth;
pub mod config;
