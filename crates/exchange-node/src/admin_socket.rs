//! Unix socket server for admin commands.
//!
//! Newline-delimited JSON: one command per line in, one response per line
//! out. Operators use it to register players, fire tribunal events and
//! inspect the halt state without going through HTTP.

use crate::engine::{Market, TribunalRequest};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Register a player, optionally with a chosen alias
    Register {
        #[serde(default)]
        alias: Option<String>,
    },
    /// Fire a tribunal event now
    Tribunal {
        event_type: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        delta_percent: Option<f64>,
        #[serde(default)]
        target_id: Option<String>,
    },
    /// Show the market halt and last tribunal times
    HaltState,
    /// Take the midnight snapshot immediately
    Snapshot,
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Data { value: serde_json::Value },
    Pong,
}

/// Admin socket server.
pub struct AdminSocket {
    market: Arc<Market>,
    socket_path: PathBuf,
}

impl AdminSocket {
    pub fn new(market: Arc<Market>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            market,
            socket_path: socket_path.into(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // A stale socket file from a previous run blocks bind.
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {}", self.socket_path.display());

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let market = Arc::clone(&self.market);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, market).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

async fn handle_connection(stream: UnixStream, market: Arc<Market>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &market),
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

fn data<T: Serialize>(value: &T) -> AdminResponse {
    match serde_json::to_value(value) {
        Ok(value) => AdminResponse::Data { value },
        Err(e) => AdminResponse::Error {
            error: e.to_string(),
        },
    }
}

fn execute_command(cmd: AdminCommand, market: &Market) -> AdminResponse {
    let result = match cmd {
        AdminCommand::Ping => return AdminResponse::Pong,

        AdminCommand::Register { alias } => market
            .register_citizen(alias.as_deref())
            .map(|reg| data(&reg)),

        AdminCommand::Tribunal {
            event_type,
            message,
            delta_percent,
            target_id,
        } => {
            let req = TribunalRequest {
                event_type: Some(event_type),
                target_id,
                message,
                delta_percent,
            };
            market.trigger_tribunal(&req).map(|outcome| {
                tracing::info!("Admin fired tribunal event {}", outcome.event_type);
                data(&outcome)
            })
        }

        AdminCommand::HaltState => market.tribunal_state().map(|state| data(&state)),

        AdminCommand::Snapshot => market.midnight_snapshot().map(|captured| AdminResponse::Ok {
            message: format!("Snapshot captured {} citizens", captured),
        }),
    };

    result.unwrap_or_else(|e| AdminResponse::Error {
        error: e.to_string(),
    })
}

/// Default socket path for a data directory.
pub fn default_socket_path(data_dir: &Path) -> PathBuf {
    data_dir.join("admin.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testkit::Harness;
    use exchange_core::{EventKind, ScriptedDice};

    #[test]
    fn command_wire_format() {
        let cmd: AdminCommand =
            serde_json::from_str(r#"{"cmd":"tribunal","event_type":"sector_crash","delta_percent":2.0}"#)
                .unwrap();
        assert_eq!(
            cmd,
            AdminCommand::Tribunal {
                event_type: "sector_crash".into(),
                message: None,
                delta_percent: Some(2.0),
                target_id: None,
            }
        );

        let cmd: AdminCommand = serde_json::from_str(r#"{"cmd":"register"}"#).unwrap();
        assert_eq!(cmd, AdminCommand::Register { alias: None });

        let pong = serde_json::to_string(&AdminResponse::Pong).unwrap();
        assert_eq!(pong, r#"{"status":"pong"}"#);
    }

    #[test]
    fn execute_commands() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let a = h.player("Citizen-0001");

        assert_eq!(execute_command(AdminCommand::Ping, &h.market), AdminResponse::Pong);

        let AdminResponse::Data { value } = execute_command(
            AdminCommand::Register {
                alias: Some("Entity-0300".into()),
            },
            &h.market,
        ) else {
            panic!("expected registration data");
        };
        assert_eq!(value["alias"], "Entity-0300");

        let response = execute_command(
            AdminCommand::Register {
                alias: Some("entity-0300".into()),
            },
            &h.market,
        );
        assert!(matches!(response, AdminResponse::Error { .. }));

        let response = execute_command(
            AdminCommand::Tribunal {
                event_type: "sector_crash".into(),
                message: None,
                delta_percent: Some(10.0),
                target_id: None,
            },
            &h.market,
        );
        assert!(matches!(response, AdminResponse::Data { .. }));
        assert_eq!(h.index_of(&a.citizen_id), 90.0);

        let response = execute_command(AdminCommand::Snapshot, &h.market);
        assert_eq!(
            response,
            AdminResponse::Ok {
                message: "Snapshot captured 2 citizens".into()
            }
        );
        assert_eq!(h.events_of(EventKind::MidnightSnapshot).len(), 1);

        h.halt();
        let AdminResponse::Data { value } = execute_command(AdminCommand::HaltState, &h.market)
        else {
            panic!("expected halt state");
        };
        assert!(!value["marketHaltUntil"].is_null());
    }

    #[tokio::test]
    async fn socket_roundtrip() {
        let h = Harness::new(ScriptedDice::constant(0.5));
        let dir = tempfile::tempdir().unwrap();
        let path = default_socket_path(dir.path());

        let server = AdminSocket::new(Arc::clone(&h.market), path.clone());
        assert_eq!(server.socket_path(), path.as_path());
        let task = tokio::spawn(async move { server.run().await });

        let mut stream = None;
        for _ in 0..50 {
            if let Ok(s) = UnixStream::connect(&path).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let stream = stream.expect("admin socket did not come up");

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        writer
            .write_all(b"{\"cmd\":\"ping\"}\nnot json\n")
            .await
            .unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(serde_json::from_str::<AdminResponse>(&line).unwrap(), AdminResponse::Pong);

        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert!(matches!(
            serde_json::from_str::<AdminResponse>(&line).unwrap(),
            AdminResponse::Error { .. }
        ));

        task.abort();
    }
}
