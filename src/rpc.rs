//! Typed configuration messages between the injector and the settings
//! owner.
//!
//! The injector never reads storage itself: it sends [`ConfigRequest`]s
//! through a [`ConfigTransport`] and receives [`ConfigResponse`]s.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::InjectContext;
use crate::history::{append_bounded, HistoryItem};
use crate::prompts::set_selected;
use crate::utils::settings::Settings;

/// A request for configuration data or a configuration change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConfigRequest {
    /// Fetch the full injection context.
    LoadContext,
    /// Persist a new selected strategy.
    SelectStrategy {
        /// Strategy id.
        id: String,
    },
    /// Append an entry to the optimization history.
    RecordHistory {
        /// Entry to store.
        item: HistoryItem,
    },
}

/// Reply to a [`ConfigRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ConfigResponse {
    /// The injection context.
    Context(Box<InjectContext>),
    /// The change was applied.
    Ack,
}

/// Errors raised while exchanging configuration messages.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The transport failed to deliver or serve the request.
    #[error("Config transport failed: {0}")]
    Transport(String),

    /// The reply did not match the request.
    #[error("Unexpected config response to {request}")]
    UnexpectedResponse {
        /// Name of the request that got the wrong reply.
        request: &'static str,
    },
}

/// Carries requests to whoever owns the configuration.
pub trait ConfigTransport: Send + Sync {
    /// Sends one request and waits for its reply.
    fn send<'a>(&'a self, request: ConfigRequest) -> BoxFuture<'a, Result<ConfigResponse, RpcError>>;
}

/// Typed facade over a [`ConfigTransport`].
#[derive(Clone)]
pub struct ConfigClient {
    transport: Arc<dyn ConfigTransport>,
}

impl ConfigClient {
    /// Wraps a transport.
    pub fn new(transport: Arc<dyn ConfigTransport>) -> Self {
        Self { transport }
    }

    /// Fetches the injection context; failures yield the default context.
    pub async fn load_context(&self) -> InjectContext {
        match self.transport.send(ConfigRequest::LoadContext).await {
            Ok(ConfigResponse::Context(ctx)) => *ctx,
            Ok(other) => {
                warn!(response = ?other, "Unexpected reply to LoadContext, using defaults");
                InjectContext::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                InjectContext::default()
            }
        }
    }

    /// Persists the selected strategy.
    pub async fn select_strategy(&self, id: &str) -> Result<(), RpcError> {
        self.expect_ack(
            "SelectStrategy",
            ConfigRequest::SelectStrategy { id: id.to_string() },
        )
        .await
    }

    /// Appends an entry to the history.
    pub async fn record_history(&self, item: HistoryItem) -> Result<(), RpcError> {
        self.expect_ack("RecordHistory", ConfigRequest::RecordHistory { item })
            .await
    }

    async fn expect_ack(&self, name: &'static str, request: ConfigRequest) -> Result<(), RpcError> {
        match self.transport.send(request).await? {
            ConfigResponse::Ack => Ok(()),
            ConfigResponse::Context(_) => Err(RpcError::UnexpectedResponse { request: name }),
        }
    }
}

/// Serves requests from the JSON settings file.
pub struct SettingsTransport {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl SettingsTransport {
    /// Serves the settings file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Serves the default settings file.
    pub fn from_default_location() -> anyhow::Result<Self> {
        Ok(Self::new(Settings::get_settings_path()?))
    }

    async fn handle(&self, request: ConfigRequest) -> anyhow::Result<ConfigResponse> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<ConfigResponse> {
            let mut settings = Settings::load_from_path(&path)?;
            match request {
                ConfigRequest::LoadContext => {
                    return Ok(ConfigResponse::Context(Box::new(settings.inject_context())));
                }
                ConfigRequest::SelectStrategy { id } => {
                    debug!(strategy_id = %id, "Persisting strategy selection");
                    settings.prompts = set_selected(&settings.prompts, &id);
                }
                ConfigRequest::RecordHistory { item } => {
                    let capacity = settings.app.history_capacity();
                    settings.history = append_bounded(&settings.history, item, capacity);
                }
            }
            settings.save_to_path(&path)?;
            Ok(ConfigResponse::Ack)
        })
        .await?
    }
}

impl ConfigTransport for SettingsTransport {
    fn send<'a>(&'a self, request: ConfigRequest) -> BoxFuture<'a, Result<ConfigResponse, RpcError>> {
        Box::pin(async move {
            self.handle(request)
                .await
                .map_err(|e| RpcError::Transport(format!("{e:#}")))
        })
    }
}

/// In-process transport holding its state in memory.
///
/// Useful for embedding without persistence and for tests; every request
/// is recorded.
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    context: InjectContext,
    history: Vec<HistoryItem>,
    requests: Vec<ConfigRequest>,
}

impl MemoryTransport {
    /// Serves `context`.
    pub fn new(context: InjectContext) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                context,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current context.
    pub fn context(&self) -> InjectContext {
        self.state().context.clone()
    }

    /// Recorded history, newest first.
    pub fn history(&self) -> Vec<HistoryItem> {
        self.state().history.clone()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ConfigRequest> {
        self.state().requests.clone()
    }
}

impl ConfigTransport for MemoryTransport {
    fn send<'a>(&'a self, request: ConfigRequest) -> BoxFuture<'a, Result<ConfigResponse, RpcError>> {
        Box::pin(async move {
            let mut state = self.state();
            state.requests.push(request.clone());
            Ok(match request {
                ConfigRequest::LoadContext => ConfigResponse::Context(Box::new(state.context.clone())),
                ConfigRequest::SelectStrategy { id } => {
                    state.context.prompts = set_selected(&state.context.prompts, &id);
                    ConfigResponse::Ack
                }
                ConfigRequest::RecordHistory { item } => {
                    state.history = append_bounded(
                        &state.history,
                        item,
                        crate::config::DEFAULT_HISTORY_COUNT,
                    );
                    ConfigResponse::Ack
                }
            })
        })
    }
}
