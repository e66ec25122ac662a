//! Unix socket server for admin commands.
//!
//! Local IPC for operators: assign ranks, issue invitations, and run the
//! identity and manifest audits. One JSON command per line, one JSON
//! response per line.

use crate::error::Result;
use crate::models::{Invitation, SovereignId};
use crate::node::AppState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use wardroom_rank::{validate_standard, Rank};

/// Admin command sent over the socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Assign a rank, or clear it with `null`
    SetRank {
        sovereign_id: String,
        rank: Option<Rank>,
    },
    /// List sovereign ids holding a rank
    ListRank { rank: Rank },
    /// Invite an email at a rank, optionally into an organization;
    /// responds with the provider ticket
    Invite {
        email: String,
        rank: Rank,
        #[serde(default)]
        org_id: Option<String>,
    },
    /// Cross-check the identity indexes
    AuditIdentities,
    /// Run the route manifest validator
    ValidateManifests,
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Pong,
}

/// Admin socket server.
pub struct AdminSocket {
    state: AppState,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(state: AppState, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            state,
            socket_path: socket_path.into(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove a stale socket file from a previous run
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
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

    /// Get the socket path.
    pub fn socket_path(&self) -> &std::path::Path {
        &self.socket_path
    }
}

async fn handle_connection(stream: UnixStream, state: AppState) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &state),
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

fn error(e: impl std::fmt::Display) -> AdminResponse {
    AdminResponse::Error {
        error: e.to_string(),
    }
}

/// Execute one admin command against the node state.
pub fn execute_command(cmd: AdminCommand, state: &AppState) -> AdminResponse {
    match cmd {
        AdminCommand::SetRank { sovereign_id, rank } => {
            let id = match SovereignId::parse(sovereign_id) {
                Ok(id) => id,
                Err(e) => return error(e),
            };
            match state.storage.set_rank(&id, rank) {
                Ok(Some(_)) => {
                    let label = rank.map(Rank::as_str).unwrap_or("none");
                    tracing::info!("Admin socket set rank of {} to {}", id, label);
                    AdminResponse::Ok {
                        message: format!("Set rank of {} to {}", id, label),
                    }
                }
                Ok(None) => error(format!("No such user: {}", id)),
                Err(e) => error(e),
            }
        }

        AdminCommand::ListRank { rank } => match state.storage.list_users_by_rank(rank) {
            Ok(users) => AdminResponse::List {
                items: users.into_iter().map(|u| u.id.to_string()).collect(),
            },
            Err(e) => error(e),
        },

        AdminCommand::Invite { email, rank, org_id } => {
            let invitation = Invitation::new(&email, rank, None).with_org(org_id);
            if let Err(e) = state.storage.put_invitation(&invitation) {
                return error(e);
            }
            match state.provider.issue_invitation(&invitation.email) {
                Ok(ticket) => {
                    tracing::info!("Admin socket invited {} as {}", invitation.email, rank);
                    AdminResponse::Ok { message: ticket }
                }
                Err(e) => error(e),
            }
        }

        AdminCommand::AuditIdentities => match state.registry.audit() {
            Ok(count) => AdminResponse::Ok {
                message: format!("{} identity mappings consistent", count),
            },
            Err(e) => error(e),
        },

        AdminCommand::ValidateManifests => {
            let report = validate_standard(&state.manifests);
            let items = report
                .errors
                .iter()
                .map(|issue| format!("error: {issue}"))
                .chain(report.warnings.iter().map(|issue| format!("warning: {issue}")))
                .collect();
            AdminResponse::List { items }
        }

        AdminCommand::Ping => AdminResponse::Pong,
    }
}

/// Default socket path.
pub fn default_socket_path() -> PathBuf {
    let data_dir =
        std::env::var("WARDROOM_DATA_DIR").unwrap_or_else(|_| "./wardroom-data".to_string());
    PathBuf::from(data_dir).join("admin.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Profile, SovereignUser};
    use crate::node::{GateConfig, GateState};
    use tempfile::{tempdir, TempDir};

    fn state() -> (TempDir, AppState) {
        let dir = tempdir().unwrap();
        let config = GateConfig {
            data_dir: dir.path().to_path_buf(),
            admin_socket: dir.path().join("admin.sock"),
            ..GateConfig::default()
        };
        let state = Arc::new(GateState::open(config).unwrap());
        (dir, state)
    }

    #[test]
    fn commands_parse_from_json() {
        let cmd: AdminCommand =
            serde_json::from_str(r#"{"cmd":"set_rank","sovereign_id":"abc","rank":null}"#).unwrap();
        assert!(matches!(cmd, AdminCommand::SetRank { rank: None, .. }));

        let cmd: AdminCommand =
            serde_json::from_str(r#"{"cmd":"invite","email":"a@b.c","rank":"captain"}"#).unwrap();
        assert!(matches!(cmd, AdminCommand::Invite { rank: Rank::Captain, .. }));
    }

    #[test]
    fn set_and_list_rank() {
        let (_dir, state) = state();
        let user =
            SovereignUser::new(SovereignId::generate(), Some(Rank::Crew), Profile::default());
        state.storage.put_user(&user).unwrap();

        let response = execute_command(
            AdminCommand::SetRank {
                sovereign_id: user.id.to_string(),
                rank: Some(Rank::Admiral),
            },
            &state,
        );
        assert!(matches!(response, AdminResponse::Ok { .. }));

        match execute_command(AdminCommand::ListRank { rank: Rank::Admiral }, &state) {
            AdminResponse::List { items } => assert_eq!(items, vec![user.id.to_string()]),
            other => panic!("unexpected response: {other:?}"),
        }

        let missing = execute_command(
            AdminCommand::SetRank {
                sovereign_id: SovereignId::generate().to_string(),
                rank: Some(Rank::Admiral),
            },
            &state,
        );
        assert!(matches!(missing, AdminResponse::Error { .. }));
    }

    #[test]
    fn invite_stores_invitation_and_returns_ticket() {
        let (_dir, state) = state();
        let response = execute_command(
            AdminCommand::Invite {
                email: "Cap@Example.com".into(),
                rank: Rank::Captain,
                org_id: Some("org_7".into()),
            },
            &state,
        );
        let AdminResponse::Ok { message: ticket } = response else {
            panic!("invite failed: {response:?}");
        };
        let stored = state.storage.get_invitation("cap@example.com").unwrap().unwrap();
        assert_eq!(stored.org_id.as_deref(), Some("org_7"));
        let identity = state.provider.verify_login(&ticket).unwrap();
        assert_eq!(identity.email.as_deref(), Some("cap@example.com"));
    }

    #[test]
    fn audits_pass_on_fresh_store() {
        let (_dir, state) = state();
        assert!(matches!(
            execute_command(AdminCommand::AuditIdentities, &state),
            AdminResponse::Ok { .. }
        ));
        match execute_command(AdminCommand::ValidateManifests, &state) {
            AdminResponse::List { items } => {
                assert!(items.iter().all(|item| !item.starts_with("error:")), "{items:?}")
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ping_over_socket() {
        let (dir, state) = state();
        let path = dir.path().join("admin.sock");
        let server = AdminSocket::new(state, path.clone());
        tokio::spawn(async move { server.run().await });

        let mut stream = None;
        for _ in 0..50 {
            match UnixStream::connect(&path).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        }
        let stream = stream.expect("admin socket did not come up");
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"cmd\":\"ping\"}\n").await.unwrap();

        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();
        assert!(matches!(
            serde_json::from_str::<AdminResponse>(&line).unwrap(),
            AdminResponse::Pong
        ));
    }
}
