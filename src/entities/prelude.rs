pub use super::characters::Entity as Characters;
pub use super::mint_orders::Entity as MintOrders;
pub use super::mint_verify_jobs::Entity as MintVerifyJobs;
pub use super::mint_webhook_replays::Entity as MintWebhookReplays;
