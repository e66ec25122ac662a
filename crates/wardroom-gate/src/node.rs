//! Gate Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with shared RocksDB storage
//! - HTTP API for sessions, page gating and data
//! - Unix admin socket for local admin ops (wardroom-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::api;
use crate::error::{Error, Result};
use crate::gate::Enforcement;
use crate::handoff::SessionKeys;
use crate::identity::IdentityRegistry;
use crate::provider::{IdentityProvider, LocalProvider};
use crate::quarantine::AccountLifecycle;
use crate::session::CookieSettings;
use crate::storage::Storage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use wardroom_rank::{validate_standard, ManifestRegistry};

const SESSION_KEY_NAME: &str = "session";
const PROVIDER_KEY_NAME: &str = "local-provider";
const SECS_PER_DAY: u64 = 24 * 60 * 60;
const MS_PER_DAY: u64 = SECS_PER_DAY * 1000;

/// Configuration for a Gate node.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for wardroom-admin CLI)
    pub admin_socket: PathBuf,

    /// Route enforcement mode
    pub enforcement: Enforcement,

    /// Add `Secure` to the session cookie
    pub secure_cookies: bool,

    /// Session credential validity window
    pub session_days: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./wardroom-data");
        Self {
            admin_socket: data_dir.join("admin.sock"),
            data_dir,
            api_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enforcement: Enforcement::Hard,
            secure_cookies: false,
            session_days: 30,
        }
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {name}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}

impl GateConfig {
    /// Create config from environment variables with defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let data_dir = std::env::var("WARDROOM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let admin_socket = std::env::var("WARDROOM_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("admin.sock"));

        let session_days = env_parse("WARDROOM_SESSION_DAYS", defaults.session_days)?;
        check_session_days(session_days)?;

        Ok(Self {
            data_dir,
            api_addr: env_parse("WARDROOM_API_ADDR", defaults.api_addr)?,
            admin_socket,
            enforcement: env_parse("WARDROOM_ENFORCEMENT", defaults.enforcement)?,
            secure_cookies: env_parse("WARDROOM_SECURE_COOKIES", defaults.secure_cookies)?,
            session_days,
        })
    }

    /// Session validity window.
    pub fn session_window(&self) -> Duration {
        Duration::from_secs(self.session_days.saturating_mul(SECS_PER_DAY))
    }
}

/// The window must be non-empty and fit in `u64` milliseconds.
fn check_session_days(days: u64) -> Result<()> {
    if days == 0 {
        return Err(Error::Config("WARDROOM_SESSION_DAYS must be at least 1".into()));
    }
    if days.checked_mul(MS_PER_DAY).is_none() {
        return Err(Error::Config(format!("WARDROOM_SESSION_DAYS={days} is too large")));
    }
    Ok(())
}

/// Shared state for the Gate node - one storage instance shared by all components.
pub struct GateState {
    pub storage: Arc<Storage>,
    pub config: GateConfig,
    pub manifests: ManifestRegistry,
    pub sessions: SessionKeys,
    pub registry: IdentityRegistry,
    pub provider: Arc<dyn IdentityProvider>,
    pub lifecycle: AccountLifecycle,
}

/// State handed to axum handlers and middleware.
pub type AppState = Arc<GateState>;

impl GateState {
    /// Open storage under `config.data_dir` with the built-in local provider.
    pub fn open(config: GateConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let storage = Arc::new(Storage::open(&config.data_dir)?);
        let provider_key = storage.get_or_create_signing_key(PROVIDER_KEY_NAME)?;
        let provider: Arc<dyn IdentityProvider> =
            Arc::new(LocalProvider::new(provider_key, Arc::clone(&storage)));
        Self::from_parts(config, storage, provider)
    }

    /// Assemble state from an open store and a provider.
    ///
    /// Validates the route manifests first: errors abort, warnings are logged.
    pub fn from_parts(
        config: GateConfig,
        storage: Arc<Storage>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let manifests = ManifestRegistry::standard()?;
        let report = validate_standard(&manifests);
        for warning in &report.warnings {
            tracing::warn!("Manifest drift: {}", warning);
        }
        if !report.is_ok() {
            for error in &report.errors {
                tracing::error!("Manifest error: {}", error);
            }
            return Err(Error::Config(format!(
                "{} route manifest error(s)",
                report.errors.len()
            )));
        }

        check_session_days(config.session_days)?;
        let session_key = storage.get_or_create_signing_key(SESSION_KEY_NAME)?;
        let sessions = SessionKeys::new(session_key, config.session_window())
            .map_err(|e| Error::Config(e.to_string()))?;
        let registry = IdentityRegistry::new(Arc::clone(&storage));
        let lifecycle =
            AccountLifecycle::new(Arc::clone(&storage), registry.clone(), Arc::clone(&provider));

        Ok(Self {
            storage,
            config,
            manifests,
            sessions,
            registry,
            provider,
            lifecycle,
        })
    }

    /// Cookie attributes for session cookies.
    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            secure: self.config.secure_cookies,
            max_age_secs: self.config.session_window().as_secs(),
        }
    }
}

/// A Gate node instance.
pub struct GateNode {
    state: AppState,
}

impl GateNode {
    /// Create a new Gate node.
    pub fn new(config: GateConfig) -> Result<Self> {
        let state = Arc::new(GateState::open(config)?);
        Ok(Self { state })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> AppState {
        Arc::clone(&self.state)
    }

    /// Run the node (starts the admin socket and the HTTP server).
    pub async fn run(self) -> Result<()> {
        let config = &self.state.config;
        tracing::info!("Gate node starting");
        tracing::info!("  API: http://{}", config.api_addr);
        tracing::info!("  Admin: {:?}", config.admin_socket);
        tracing::info!("  Data: {:?}", config.data_dir);
        tracing::info!("  Enforcement: {}", config.enforcement);

        let admin_socket = AdminSocket::new(self.state(), config.admin_socket.clone());
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        let app = api::build_router(self.state());

        let listener = tokio::net::TcpListener::bind(config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
