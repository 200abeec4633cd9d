//! Development server implementation.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path as UrlPath, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::sync::{broadcast, watch};

use playpen_bundler::{
    find_entry, is_ignored, starter_project, virtual_path_for, RolldownCompiler, StoreError,
    VirtualFileStore, STARTER_OPEN_FILE,
};
use playpen_preview::{
    FrameId, LiveConfig, LiveLoop, PanelMessage, PreviewConfig, PreviewHost,
};

use crate::page::PageRenderer;
use crate::surface::{preview_url, ServedSurface};
use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{hmr_client_script, ClientMessage, HmrHub, ServerMessage};

/// WebSocket route.
const HMR_ROUTE: &str = "/__hmr";

/// Client script route.
const HMR_SCRIPT_ROUTE: &str = "/__hmr.js";

/// Frame documents may run scripts but get an opaque origin.
const PREVIEW_CSP: &str = "sandbox allow-scripts";

/// The live loop as wired by the dev server.
pub type Live = LiveLoop<RolldownCompiler, ServedSurface>;

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Project directory; the starter project is used when it does not exist
    pub project_dir: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Compiler used for every run
    pub compiler: RolldownCompiler,

    /// Preview document and frame settings
    pub preview: PreviewConfig,

    /// Debounce and entry settings
    pub live: LiveConfig,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("playground"),
            port: 7777,
            host: "127.0.0.1".to_string(),
            open: true,
            compiler: RolldownCompiler::default(),
            preview: PreviewConfig::default(),
            live: LiveConfig::default(),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error(transparent)]
    Project(#[from] StoreError),
}

/// Shared server state.
struct ServerState {
    hub: HmrHub,
    surface: Arc<ServedSurface>,
    live: Live,
    page: PageRenderer,
    title: String,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Load the project and wire the live loop to a served surface.
    fn prepare(&self) -> Result<Arc<ServerState>, ServerError> {
        let files = load_project(&self.config.project_dir)?;
        let open = initial_open_file(&files, self.config.live.entry.as_deref());

        let hub = HmrHub::new();
        let surface = Arc::new(ServedSurface::new(hub.clone()));
        let host = PreviewHost::new(Arc::clone(&surface), self.config.preview.clone());
        let live = LiveLoop::new(
            files,
            &open,
            self.config.compiler.clone(),
            host,
            self.config.live.clone(),
        );

        Ok(Arc::new(ServerState {
            hub,
            surface,
            live,
            page: PageRenderer::new(),
            title: self.config.preview.title.clone(),
        }))
    }

    /// Start the development server.
    pub async fn start(self) -> Result<(), ServerError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(address))?;

        let state = self.prepare()?;

        tokio::spawn(forward_panel(
            state.live.subscribe_errors(),
            state.hub.clone(),
        ));

        // First compile, so a preview is ready when the page connects
        let live = state.live.clone();
        tokio::spawn(async move {
            live.run().await;
        });

        // Keep the watcher alive for the lifetime of the server
        let _watcher = if self.config.project_dir.is_dir() {
            let root = self.config.project_dir.clone();
            let (watcher, mut rx) =
                FileWatcher::new(&root).map_err(|e| ServerError::WatchError(e.to_string()))?;

            let state_clone = Arc::clone(&state);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    handle_watch_event(&state_clone, &root, event).await;
                }
            });
            Some(watcher)
        } else {
            None
        };

        let app = router(state);

        tracing::info!("Starting dev server at http://{}", addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            if let Err(e) = open::that(&url) {
                tracing::debug!("Could not open browser: {}", e);
            }
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route(HMR_ROUTE, get(ws_handler))
        .route(HMR_SCRIPT_ROUTE, get(hmr_script_handler))
        .route("/__status", get(status_handler))
        .route("/__preview/{id}", get(preview_handler))
        .with_state(state)
}

/// Load `dir`, or the starter project when `dir` is missing or empty.
fn load_project(dir: &Path) -> Result<VirtualFileStore, ServerError> {
    if !dir.exists() {
        tracing::info!(
            "{} does not exist; using the starter project",
            dir.display()
        );
        return Ok(starter_project());
    }

    let files = VirtualFileStore::from_dir(dir)?;
    if files.is_empty() {
        tracing::info!("{} is empty; using the starter project", dir.display());
        return Ok(starter_project());
    }

    tracing::info!("Loaded {} files from {}", files.len(), dir.display());
    Ok(files)
}

/// File shown in the editor on start.
fn initial_open_file(files: &VirtualFileStore, entry: Option<&str>) -> String {
    if files.has(STARTER_OPEN_FILE) {
        return STARTER_OPEN_FILE.to_string();
    }
    find_entry(files, entry)
        .ok()
        .or_else(|| files.paths().next().map(str::to_string))
        .unwrap_or_else(|| STARTER_OPEN_FILE.to_string())
}

/// Mirror the error panel to every connected page.
async fn forward_panel(mut errors: watch::Receiver<Option<PanelMessage>>, hub: HmrHub) {
    while errors.changed().await.is_ok() {
        let panel = errors.borrow_and_update().clone();
        hub.send(ServerMessage::from(panel));
    }
}

fn workspace_message(live: &Live) -> ServerMessage {
    ServerMessage::Workspace {
        files: live.paths(),
        open: live.open_path(),
    }
}

/// Apply a file-system change to the live loop.
async fn handle_watch_event(state: &ServerState, root: &Path, event: WatchEvent) {
    match event {
        WatchEvent::Changed(path) => {
            let Some(virtual_path) = virtual_path_for(root, &path) else {
                return;
            };
            if is_ignored(&virtual_path) || !path.is_file() {
                return;
            }

            let code = match tokio::fs::read_to_string(&path).await {
                Ok(code) => code,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                    return;
                }
            };

            let previous = state.live.read(&virtual_path);
            if previous.as_deref() == Some(code.as_str()) {
                return;
            }

            if let Err(e) = state.live.edit_file(&virtual_path, code) {
                tracing::warn!("Ignoring {}: {}", path.display(), e);
                return;
            }
            tracing::info!("Changed: {}", virtual_path);

            if previous.is_none() {
                state.hub.send(workspace_message(&state.live));
            }
            if virtual_path == state.live.open_path() {
                if let Ok(file) = state.live.open_file() {
                    state.hub.send(ServerMessage::from(file));
                }
            }
        }

        WatchEvent::Removed(path) => {
            let Some(virtual_path) = virtual_path_for(root, &path) else {
                return;
            };
            if state.live.remove_file(&virtual_path) {
                tracing::info!("Removed: {}", virtual_path);
                state.hub.send(workspace_message(&state.live));
            }
        }
    }
}

/// Handler for the playground page.
async fn index_handler(State(state): State<Arc<ServerState>>) -> Response {
    match state.page.render(&state.title, HMR_SCRIPT_ROUTE) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!("Failed to render playground page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Handler for preview frame documents.
async fn preview_handler(
    UrlPath(id): UrlPath<String>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    let document = id
        .parse::<FrameId>()
        .ok()
        .and_then(|id| state.surface.document(id));

    match document {
        Some(document) => (
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CONTENT_SECURITY_POLICY, PREVIEW_CSP),
                (header::CACHE_CONTROL, "no-store"),
            ],
            document.html,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Handler for the loop status.
async fn status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.live.status())
}

/// Handler for the HMR WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Messages that bring a newly connected page up to date.
async fn initial_messages(state: &ServerState) -> Vec<ServerMessage> {
    let mut messages = vec![ServerMessage::Connected, workspace_message(&state.live)];

    if let Ok(file) = state.live.open_file() {
        messages.push(ServerMessage::from(file));
    }
    if let Some(id) = state.live.current_frame().await {
        messages.push(ServerMessage::Preview {
            id,
            url: preview_url(id),
        });
    }
    if let Some(panel) = state.live.current_error() {
        messages.push(ServerMessage::from(Some(panel)));
    }
    messages
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to encode message: {}", e);
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    for msg in initial_messages(&state).await {
        if !send_message(&mut socket, &msg).await {
            return;
        }
    }

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Ok(msg) => {
                    if !send_message(&mut socket, &msg).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Page lagged behind by {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => handle_client_message(&state, text.as_str()),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

fn handle_client_message(state: &ServerState, text: &str) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!("Ignoring malformed client message: {}", e);
            return;
        }
    };

    match msg {
        ClientMessage::Edit { code } => {
            if let Err(e) = state.live.edit(code) {
                tracing::warn!("Edit rejected: {}", e);
            }
        }
        ClientMessage::Open { path } => match state.live.open(&path) {
            Ok(file) => state.hub.send(ServerMessage::from(file)),
            Err(e) => tracing::warn!("Cannot open {}: {}", path, e),
        },
        ClientMessage::FrameLoaded { id } => {
            state.surface.notify_loaded(id);
        }
        ClientMessage::DismissError => state.live.dismiss_error(),
    }
}

/// Handler for the HMR client script.
async fn hmr_script_handler() -> impl IntoResponse {
    let script = hmr_client_script(HMR_ROUTE);
    ([(header::CONTENT_TYPE, "application/javascript")], script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use playpen_preview::PreviewSurface;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn server_for(dir: &Path) -> DevServer {
        DevServer::new(DevServerConfig {
            project_dir: dir.to_path_buf(),
            open: false,
            ..Default::default()
        })
    }

    #[test]
    fn creates_server_with_default_config() {
        let server = DevServer::new(DevServerConfig::default());
        assert_eq!(server.config.port, 7777);
        assert_eq!(server.config.project_dir, PathBuf::from("playground"));
    }

    #[tokio::test]
    async fn missing_project_uses_starter() {
        let temp = tempdir().unwrap();
        let state = server_for(&temp.path().join("absent")).prepare().unwrap();

        assert_eq!(state.live.open_path(), STARTER_OPEN_FILE);
        assert!(state.live.paths().contains(&"/src/main.ts".to_string()));
    }

    #[tokio::test]
    async fn loads_project_and_opens_entry() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/main.ts"), "console.log(1);").unwrap();

        let state = server_for(temp.path()).prepare().unwrap();

        assert_eq!(state.live.open_path(), "/src/main.ts");
        assert_eq!(state.live.paths(), vec!["/src/main.ts".to_string()]);
    }

    #[tokio::test]
    async fn watch_events_update_the_store() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/main.ts"), "console.log(1);").unwrap();
        let state = server_for(temp.path()).prepare().unwrap();
        let mut rx = state.hub.subscribe();

        fs::write(temp.path().join("src/main.ts"), "console.log(2);").unwrap();
        handle_watch_event(
            &state,
            temp.path(),
            WatchEvent::Changed(temp.path().join("src/main.ts")),
        )
        .await;

        assert_eq!(
            state.live.read("/src/main.ts").as_deref(),
            Some("console.log(2);")
        );
        match rx.try_recv() {
            Ok(ServerMessage::Opened { path, code, .. }) => {
                assert_eq!(path, "/src/main.ts");
                assert_eq!(code, "console.log(2);");
            }
            other => panic!("Expected Opened, got {:?}", other),
        }

        fs::remove_file(temp.path().join("src/main.ts")).unwrap();
        handle_watch_event(
            &state,
            temp.path(),
            WatchEvent::Removed(temp.path().join("src/main.ts")),
        )
        .await;
        assert!(state.live.read("/src/main.ts").is_none());
    }

    #[tokio::test]
    async fn ignores_changes_in_dependency_directories() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("node_modules/x")).unwrap();
        fs::write(temp.path().join("node_modules/x/index.js"), "x").unwrap();
        fs::write(temp.path().join("main.ts"), "1;").unwrap();
        let state = server_for(temp.path()).prepare().unwrap();

        handle_watch_event(
            &state,
            temp.path(),
            WatchEvent::Changed(temp.path().join("node_modules/x/index.js")),
        )
        .await;

        assert!(state.live.read("/node_modules/x/index.js").is_none());
    }

    #[tokio::test]
    async fn preview_route_serves_live_frames_only() {
        let temp = tempdir().unwrap();
        let state = server_for(&temp.path().join("absent")).prepare().unwrap();
        let frame = state
            .surface
            .mount(&playpen_preview::PreviewDocument {
                html: "<p>frame</p>".to_string(),
            })
            .unwrap();

        let response =
            preview_handler(UrlPath(frame.id.to_string()), State(Arc::clone(&state))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_SECURITY_POLICY],
            PREVIEW_CSP
        );

        state.surface.release(frame.id);
        let response =
            preview_handler(UrlPath(frame.id.to_string()), State(Arc::clone(&state))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            preview_handler(UrlPath("not-a-frame".to_string()), State(state)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn client_messages_drive_the_loop() {
        let temp = tempdir().unwrap();
        let state = server_for(&temp.path().join("absent")).prepare().unwrap();
        let mut rx = state.hub.subscribe();

        handle_client_message(&state, r#"{"type":"open","path":"/src/main.ts"}"#);
        assert_eq!(state.live.open_path(), "/src/main.ts");
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Opened { ref language, .. }) if language == "typescript"
        ));

        handle_client_message(&state, r#"{"type":"edit","code":"export {};"}"#);
        assert_eq!(state.live.read("/src/main.ts").as_deref(), Some("export {};"));

        handle_client_message(&state, "not json");
    }

    #[tokio::test]
    async fn new_pages_receive_workspace_and_open_file() {
        let temp = tempdir().unwrap();
        let state = server_for(&temp.path().join("absent")).prepare().unwrap();

        let messages = initial_messages(&state).await;

        assert_eq!(messages[0], ServerMessage::Connected);
        assert!(matches!(messages[1], ServerMessage::Workspace { .. }));
        assert!(matches!(
            &messages[2],
            ServerMessage::Opened { path, .. } if path == STARTER_OPEN_FILE
        ));
        assert_eq!(messages.len(), 3);
    }
}
