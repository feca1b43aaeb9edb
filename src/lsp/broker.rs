//! LSP Broker (C8): one subprocess per `(root, language)` pair, spawned on
//! demand and reaped on idle (spec.md §4.7).

use super::protocol::{file_uri, notification_frame, read_frame, request_frame, write_frame};
use crate::config::{LspConfig, LspLanguageConfig};
use crate::error::LspError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex, RwLock as AsyncRwLock};

/// Idempotent methods that retry once after 100ms on a transient failure
/// (spec.md §4.7 "Retry policy").
const IDEMPOTENT_METHODS: &[&str] = &[
    "textDocument/definition",
    "textDocument/references",
    "textDocument/hover",
    "workspace/symbol",
    "textDocument/prepareRename",
];

const RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Uninitialized,
    Starting,
    Ready,
    Stopping,
    Stopped,
    Error,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerState::Uninitialized => "uninitialized",
            ServerState::Starting => "starting",
            ServerState::Ready => "ready",
            ServerState::Stopping => "stopping",
            ServerState::Stopped => "stopped",
            ServerState::Error => "error",
        };
        f.write_str(s)
    }
}

struct ServerHandle {
    language: String,
    state: AsyncRwLock<ServerState>,
    child: AsyncMutex<Child>,
    stdin: AsyncMutex<tokio::process::ChildStdin>,
    correlation: AsyncMutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>,
    next_id: AtomicU64,
    last_used: AsyncMutex<Instant>,
    capabilities: AsyncMutex<Option<serde_json::Value>>,
}

impl ServerHandle {
    async fn set_state(&self, state: ServerState) {
        *self.state.write().await = state;
    }

    async fn touch(&self) {
        *self.last_used.write().await = Instant::now();
    }
}

/// Runs exactly one subprocess per `(root, language)` pair while it is needed.
pub struct LspBroker {
    config: LspConfig,
    servers: AsyncMutex<HashMap<(PathBuf, String), Arc<ServerHandle>>>,
    closed: AtomicBool,
}

impl LspBroker {
    pub fn new(config: LspConfig) -> Self {
        Self {
            config,
            servers: AsyncMutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns a ready server for `(root, language)`, spawning it if needed.
    /// The whole-map lock held during lookup-and-insert guarantees no two
    /// callers spawn the same pair concurrently.
    async fn get_or_spawn(&self, root: &std::path::Path, language: &str) -> Result<Arc<ServerHandle>, LspError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LspError::BrokerClosed {
                language: language.to_string(),
            });
        }

        let key = (root.to_path_buf(), language.to_string());
        let mut servers = self.servers.lock().await;
        if let Some(handle) = servers.get(&key) {
            if *handle.state.read().await == ServerState::Ready {
                return Ok(handle.clone());
            }
        }

        let lang_config = self
            .config
            .languages
            .get(language)
            .ok_or_else(|| LspError::NotInstalled {
                language: language.to_string(),
            })?
            .clone();

        let handle = self.spawn(root, language, &lang_config).await?;
        servers.insert(key, handle.clone());
        Ok(handle)
    }

    async fn spawn(
        &self,
        root: &std::path::Path,
        language: &str,
        lang_config: &LspLanguageConfig,
    ) -> Result<Arc<ServerHandle>, LspError> {
        let mut command = Command::new(&lang_config.command);
        command
            .args(&lang_config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null());

        let mut child = command.spawn().map_err(|e| LspError::NotInstalled {
            language: format!("{language}: {e}"),
        })?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let handle = Arc::new(ServerHandle {
            language: language.to_string(),
            state: AsyncRwLock::new(ServerState::Starting),
            child: AsyncMutex::new(child),
            stdin: AsyncMutex::new(stdin),
            correlation: AsyncMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            last_used: AsyncMutex::new(Instant::now()),
            capabilities: AsyncMutex::new(None),
        });

        spawn_reader(handle.clone(), BufReader::new(stdout));

        let root_uri = file_uri(root);
        let init_params = serde_json::json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {},
            "initializationOptions": lang_config.init_options,
        });

        let startup_timeout = Duration::from_secs(self.config.startup_timeout_secs);
        let response = send_request(&handle, "initialize", init_params, startup_timeout)
            .await
            .map_err(|_| LspError::InitializeFailed {
                language: language.to_string(),
                reason: "startup timed out".to_string(),
            })?;

        *handle.capabilities.lock().await = response.get("result").cloned();
        send_notification(&handle, "initialized", serde_json::json!({})).await;
        handle.set_state(ServerState::Ready).await;
        crate::log_event!("lsp", "server ready", "{language} at {}", root.display());
        Ok(handle)
    }

    /// Send `(method, params)` to the server for `(root, language)`, honoring
    /// the idempotent-operation retry policy.
    #[tracing::instrument(skip(self, params), fields(language, method))]
    pub async fn request(
        &self,
        root: &std::path::Path,
        language: &str,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, LspError> {
        let handle = self.get_or_spawn(root, language).await?;
        if *handle.state.read().await != ServerState::Ready {
            return Err(LspError::NotRunning {
                language: language.to_string(),
                state: handle.state.read().await.to_string(),
            });
        }

        handle.touch().await;
        match send_request(&handle, method, params.clone(), timeout).await {
            Ok(value) => Ok(value),
            Err(e) if IDEMPOTENT_METHODS.contains(&method) && e.is_transient() => {
                tokio::time::sleep(RETRY_DELAY).await;
                send_request(&handle, method, params, timeout).await
            }
            Err(e) => Err(e),
        }
    }

    /// Graceful shutdown of any server whose `last_used` predates
    /// `idle_timeout`. Intended to be driven by a periodic background task.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_idle(&self, idle_timeout: Duration) {
        let stale: Vec<(PathBuf, String)> = {
            let servers = self.servers.lock().await;
            let mut out = Vec::new();
            for (key, handle) in servers.iter() {
                if handle.last_used.lock().await.elapsed() > idle_timeout {
                    out.push(key.clone());
                }
            }
            out
        };

        for key in stale {
            self.shutdown_one(&key).await;
        }
    }

    async fn shutdown_one(&self, key: &(PathBuf, String)) {
        let handle = {
            let mut servers = self.servers.lock().await;
            servers.remove(key)
        };
        let Some(handle) = handle else { return };
        shutdown_handle(&handle).await;
    }

    /// Marks the broker closed (rejecting new spawns) and shuts down every
    /// running server concurrently.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let handles: Vec<Arc<ServerHandle>> = {
            let mut servers = self.servers.lock().await;
            servers.drain().map(|(_, v)| v).collect()
        };
        crate::log_event!("lsp", "shutting down all servers", "{} server(s)", handles.len());

        let mut tasks = tokio::task::JoinSet::new();
        for handle in handles {
            tasks.spawn(async move { shutdown_handle(&handle).await });
        }
        while tasks.join_next().await.is_some() {}
    }

    #[tracing::instrument(skip(self))]
    pub async fn status(&self, root: &std::path::Path, language: &str) -> ServerState {
        let servers = self.servers.lock().await;
        match servers.get(&(root.to_path_buf(), language.to_string())) {
            Some(handle) => *handle.state.read().await,
            None => ServerState::Uninitialized,
        }
    }
}

async fn shutdown_handle(handle: &Arc<ServerHandle>) {
    handle.set_state(ServerState::Stopping).await;
    let _ = send_request(handle, "shutdown", serde_json::Value::Null, Duration::from_secs(5)).await;
    send_notification(handle, "exit", serde_json::Value::Null).await;

    let mut child = handle.child.lock().await;
    let wait = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
    if wait.is_err() {
        let _ = child.start_kill();
    }
    handle.set_state(ServerState::Stopped).await;
    crate::debug_event!("lsp", "server stopped", "{}", handle.language);
}

async fn send_request(
    handle: &Arc<ServerHandle>,
    method: &str,
    params: serde_json::Value,
    timeout: Duration,
) -> Result<serde_json::Value, LspError> {
    let id = handle.next_id.fetch_add(1, Ordering::SeqCst);
    let (tx, rx) = oneshot::channel();
    handle.correlation.lock().await.insert(id, tx);

    {
        let mut stdin = handle.stdin.lock().await;
        if write_frame(&mut *stdin, &request_frame(id, method, params)).await.is_err() {
            handle.correlation.lock().await.remove(&id);
            return Err(LspError::ServerCrashed {
                language: handle.language.clone(),
                reason: "write to stdin failed".to_string(),
            });
        }
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(LspError::ServerCrashed {
            language: handle.language.clone(),
            reason: "correlation channel dropped".to_string(),
        }),
        Err(_) => {
            handle.correlation.lock().await.remove(&id);
            Err(LspError::RequestTimeout {
                method: method.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}

async fn send_notification(handle: &Arc<ServerHandle>, method: &str, params: serde_json::Value) {
    let mut stdin = handle.stdin.lock().await;
    let _ = write_frame(&mut *stdin, &notification_frame(method, params)).await;
}

/// Single reader loop per server: dispatches responses by id, logs and
/// discards server-sent notifications (spec.md §4.7 "Protocol").
fn spawn_reader(handle: Arc<ServerHandle>, mut reader: BufReader<tokio::process::ChildStdout>) {
    tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    handle.touch().await;
                    if let Some(id) = frame.get("id").and_then(|v| v.as_u64()) {
                        if let Some(waiter) = handle.correlation.lock().await.remove(&id) {
                            let _ = waiter.send(frame);
                        } else {
                            tracing::debug!(id, "lsp response for unknown request id, discarding");
                        }
                    } else if let Some(method) = frame.get("method").and_then(|v| v.as_str()) {
                        tracing::debug!(method, "lsp server notification, discarding");
                    }
                }
                Ok(None) => {
                    handle.set_state(ServerState::Error).await;
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "lsp frame read error");
                    handle.set_state(ServerState::Error).await;
                    break;
                }
            }
        }
    });
}
