//! Exchange Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with one shared store
//! - Background drift, tribunal and midnight loops
//! - HTTP API for players and operators
//! - Unix admin socket for local admin ops (exchange-admin CLI)

use crate::admin_socket::{default_socket_path, AdminSocket};
use crate::api;
use crate::engine::Market;
use crate::error::{Error, Result};
use crate::scheduler::SchedulerHandle;
use crate::storage::{MarketStore, MemoryStore, Storage};
use exchange_core::schedule::ScheduleTimings;
use exchange_core::{IndexMutator, DEFAULT_DAMPEN_FACTOR};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Which store backs the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Persistent RocksDB under the data directory
    RocksDb,
    /// In-process maps, lost on exit
    Memory,
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rocksdb" | "rocks" => Ok(Self::RocksDb),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(Error::Config(format!(
                "EXCHANGE_STORE must be rocksdb or memory, got '{other}'"
            ))),
        }
    }
}

/// Configuration for an exchange node.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for exchange-admin CLI)
    pub admin_socket: PathBuf,

    pub store: StoreKind,

    /// Multiplier on negative deltas while stability is active
    pub dampen_factor: f64,

    /// Run the drift, tribunal and midnight loops
    pub schedulers: bool,

    pub timings: ScheduleTimings,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./exchange-data");
        Self {
            admin_socket: default_socket_path(&data_dir),
            data_dir,
            api_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            store: StoreKind::RocksDb,
            dampen_factor: DEFAULT_DAMPEN_FACTOR,
            schedulers: true,
            timings: ScheduleTimings::default(),
        }
    }
}

impl ExchangeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Missing keys take defaults; present
    /// but malformed keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let data_dir = lookup("EXCHANGE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let api_addr = match lookup("EXCHANGE_API_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid EXCHANGE_API_ADDR '{raw}'")))?,
            None => defaults.api_addr,
        };

        let admin_socket = lookup("EXCHANGE_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_socket_path(&data_dir));

        let store = match lookup("EXCHANGE_STORE") {
            Some(raw) => raw.parse()?,
            None => defaults.store,
        };

        let dampen_factor = match lookup("STABILITY_DAMPEN_FACTOR") {
            Some(raw) => parse_dampen_factor(&raw)?,
            None => defaults.dampen_factor,
        };

        let schedulers = match lookup("EXCHANGE_SCHEDULERS").as_deref() {
            None => defaults.schedulers,
            Some("on" | "true" | "1") => true,
            Some("off" | "false" | "0") => false,
            Some(other) => {
                return Err(Error::Config(format!(
                    "EXCHANGE_SCHEDULERS must be on or off, got '{other}'"
                )))
            }
        };

        Ok(Self {
            data_dir,
            api_addr,
            admin_socket,
            store,
            dampen_factor,
            schedulers,
            timings: defaults.timings,
        })
    }
}

fn parse_dampen_factor(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(f) if (0.0..=1.0).contains(&f) => Ok(f),
        _ => Err(Error::Config(format!(
            "STABILITY_DAMPEN_FACTOR must be a number in [0, 1], got '{raw}'"
        ))),
    }
}

/// An exchange node instance.
pub struct ExchangeNode {
    market: Arc<Market>,
    config: ExchangeConfig,
}

impl ExchangeNode {
    /// Open the store and build the market.
    pub async fn new(config: ExchangeConfig) -> Result<Self> {
        let store: Arc<dyn MarketStore> = match config.store {
            StoreKind::RocksDb => {
                std::fs::create_dir_all(&config.data_dir)?;
                Arc::new(Storage::open(&config.data_dir)?)
            }
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };
        store.init_system_state()?;

        let market = Arc::new(Market::live(store, IndexMutator::new(config.dampen_factor)));
        Ok(Self { market, config })
    }

    pub fn market(&self) -> Arc<Market> {
        Arc::clone(&self.market)
    }

    /// Run the node until ctrl-c: schedulers, admin socket and HTTP API.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Exchange node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?} ({:?})", self.config.data_dir, self.config.store);
        tracing::info!("  Dampen factor: {}", self.market.mutator().dampen_factor());

        let schedulers = if self.config.schedulers {
            Some(SchedulerHandle::start(self.market(), self.config.timings))
        } else {
            tracing::info!("Schedulers disabled");
            None
        };

        let admin_socket = AdminSocket::new(self.market(), self.config.admin_socket.clone());
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        let app = api::build_router(self.market());
        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP API listening on {}", self.config.api_addr);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Some(handle) = schedulers {
            handle.shutdown().await;
        }
        served?;

        tracing::info!("Exchange node stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
