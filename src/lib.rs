pub mod aggregate;
pub mod api;
pub mod catalog;
pub mod database_sqlx;
pub mod fetcher;
pub mod metrics;
pub mod models;
pub mod pipeline;

pub use api::{ApiError, FiindoClient, MarketDataProvider, StatementKind};
pub use database_sqlx::DatabaseManager;
pub use models::Config;
