//! SQLite adapters for the persistence ports.

pub mod api_key_repository;
pub mod bot_repository;
pub mod chat_repository;
pub mod connection;
pub mod event_repository;
pub mod migrations;
pub mod queue_repository;
pub mod screenshot_repository;
pub mod slot_repository;
pub mod tenant_repository;
pub mod usage_repository;

pub use api_key_repository::SqliteApiKeyRepository;
pub use bot_repository::SqliteBotRepository;
pub use chat_repository::SqliteChatRepository;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolOptions};
pub use event_repository::SqliteEventRepository;
pub use migrations::{all_embedded_migrations, migrate, Migration, MigrationError, Migrator};
pub use queue_repository::SqliteQueueRepository;
pub use screenshot_repository::SqliteScreenshotRepository;
pub use slot_repository::SqliteSlotRepository;
pub use tenant_repository::SqliteTenantRepository;
pub use usage_repository::SqliteUsageRepository;
