// src/server/http.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::config::model::ServeSection;
use crate::server::DevServer;

pub const LIVERELOAD_PATH: &str = "/__livereload";
pub const CLIENT_SCRIPT_PATH: &str = "/__livereload.js";

const SCRIPT_TAG: &str = r#"<script src="/__livereload.js"></script>"#;

const CLIENT_SCRIPT: &str = r#"(function () {
  var url = (location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/__livereload";
  function connect() {
    var socket = new WebSocket(url);
    socket.onmessage = function (event) {
      if (event.data === "reload") {
        location.reload();
      }
    };
    socket.onclose = function () {
      setTimeout(connect, 1000);
    };
  }
  connect();
})();
"#;

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
    /// `0` picks a free port.
    pub port: u16,
    /// Delay between [`DevServer::reload`] and the broadcast.
    pub reload_delay: Duration,
}

impl ServeOptions {
    pub fn from_config(section: &ServeSection) -> Self {
        Self {
            host: section.host.clone(),
            port: section.port,
            reload_delay: Duration::from_millis(section.reload_delay_ms),
        }
    }
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self::from_config(&ServeSection::default())
    }
}

/// axum server over a static directory, with a websocket reload channel.
///
/// HTML responses get the reload client injected. The server task is
/// aborted when this value is dropped.
#[derive(Debug)]
pub struct HttpDevServer {
    addr: SocketAddr,
    reload_tx: broadcast::Sender<()>,
    reload_delay: Duration,
    task: JoinHandle<()>,
}

impl HttpDevServer {
    pub async fn serve(root: impl Into<PathBuf>, options: ServeOptions) -> Result<Self> {
        let root = root.into();
        let (reload_tx, _) = broadcast::channel(16);

        let listener = TcpListener::bind((options.host.as_str(), options.port))
            .await
            .with_context(|| format!("binding dev server to {}:{}", options.host, options.port))?;
        let addr = listener.local_addr()?;

        let app = router(root.clone(), reload_tx.clone());
        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!(%err, "dev server stopped");
            }
        });

        info!(root = %root.display(), "serving on http://{addr}");
        Ok(Self {
            addr,
            reload_tx,
            reload_delay: options.reload_delay,
            task,
        })
    }
}

impl DevServer for HttpDevServer {
    fn reload(&self) {
        let tx = self.reload_tx.clone();
        let delay = self.reload_delay;

        let broadcast = move || match tx.send(()) {
            Ok(clients) => info!(clients, "reload sent"),
            Err(_) => debug!("reload requested with no connected clients"),
        };

        if delay.is_zero() {
            broadcast();
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                broadcast();
            });
        }
    }

    fn address(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }
}

impl Drop for HttpDevServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(root: PathBuf, reload_tx: broadcast::Sender<()>) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload_socket))
        .route(CLIENT_SCRIPT_PATH, get(client_script))
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(inject_client))
        .with_state(reload_tx)
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

async fn livereload_socket(
    ws: WebSocketUpgrade,
    State(reload_tx): State<broadcast::Sender<()>>,
) -> impl IntoResponse {
    let reloads = reload_tx.subscribe();
    ws.on_upgrade(move |socket| forward_reloads(socket, reloads))
}

async fn forward_reloads(mut socket: WebSocket, mut reloads: broadcast::Receiver<()>) {
    debug!("livereload client connected");
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            reload = reloads.recv() => match reload {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    if socket.send(Message::Text("reload".into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("livereload client disconnected");
}

async fn inject_client(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, "failed to buffer HTML response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script_tag(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Insert the client script before the last `</body>`, or append it.
fn inject_script_tag(html: &str) -> String {
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => format!("{}{SCRIPT_TAG}{}", &html[..pos], &html[pos..]),
        None => format!("{html}{SCRIPT_TAG}"),
    }
}
