//! Dystopian Exchange - Market Node
//!
//! Hosts the market defined in `exchange-core`: a store of citizens, users,
//! votes and events, the engine that applies votes, stability purchases and
//! tribunal shocks, the background loops that move the market on their own,
//! and the surfaces operators and players reach it through.
//!
//! # Architecture
//!
//! - **Storage**: RocksDB-backed persistent store, plus an in-memory one
//! - **Engine**: every market operation, on top of the store
//! - **Scheduler**: drift, tribunal and midnight snapshot loops
//! - **API**: HTTP endpoints for players and operators
//! - **Admin Socket**: Unix socket for local admin commands (exchange-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use exchange_node::{ExchangeConfig, ExchangeNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExchangeConfig::from_env()?;
//!     let node = ExchangeNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod api;
pub mod engine;
pub mod error;
pub mod node;
pub mod scheduler;
pub mod storage;

pub use engine::Market;
pub use error::{Error, Result};
pub use node::{ExchangeConfig, ExchangeNode, StoreKind};
pub use scheduler::SchedulerHandle;
pub use storage::{MarketStore, MemoryStore, Storage};
