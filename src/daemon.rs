//! WebSocket server for the file browser
//!
//! Each connection sends JSON `ClientMessage`s and receives one
//! `ServerMessage` per request, in order.

use crate::filesystem::FileSystemService;
use crate::protocol::{ClientMessage, FileSystemError, ServerMessage};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Message},
};

/// Default WebSocket port
pub const DEFAULT_PORT: u16 = 8731;

/// Bind `addr` and serve until Ctrl+C or SIGTERM
pub async fn run(addr: SocketAddr, fs: Arc<FileSystemService>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("WebSocket server listening on {}", listener.local_addr()?);

    serve(listener, fs).await;
    Ok(())
}

/// Accept loop with platform-specific signal handling
pub async fn serve(listener: TcpListener, fs: Arc<FileSystemService>) {
    #[cfg(unix)]
    run_server_loop_unix(listener, fs).await;

    #[cfg(not(unix))]
    run_server_loop_ctrlc_only(listener, fs).await;
}

#[cfg(unix)]
async fn run_server_loop_unix(listener: TcpListener, fs: Arc<FileSystemService>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(
                "Failed to set up SIGTERM handler: {:?}. Only Ctrl+C will work for shutdown.",
                e
            );
            run_server_loop_ctrlc_only(listener, fs).await;
            return;
        }
    };

    loop {
        tokio::select! {
            result = listener.accept() => accept(result, &fs),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Server shutting down (Ctrl+C)");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("Server shutting down (SIGTERM)");
                break;
            }
        }
    }
}

async fn run_server_loop_ctrlc_only(listener: TcpListener, fs: Arc<FileSystemService>) {
    loop {
        tokio::select! {
            result = listener.accept() => accept(result, &fs),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Server shutting down (Ctrl+C)");
                break;
            }
        }
    }
}

fn accept(result: std::io::Result<(TcpStream, SocketAddr)>, fs: &Arc<FileSystemService>) {
    match result {
        Ok((stream, addr)) => {
            let fs = fs.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, fs).await {
                    tracing::debug!("Connection {} closed with error: {}", addr, e);
                }
            });
        }
        Err(e) => tracing::warn!("Failed to accept connection: {}", e),
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    fs: Arc<FileSystemService>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Raw reads travel base64-encoded; keep headroom above the read cap.
    let ws_config = WebSocketConfig {
        max_message_size: Some(96 * 1024 * 1024),
        max_frame_size: Some(96 * 1024 * 1024),
        ..Default::default()
    };
    let ws = accept_async_with_config(stream, Some(ws_config)).await?;
    let (mut tx, mut rx) = ws.split();
    tracing::info!("Client connected: {}", addr);

    while let Some(result) = rx.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    let reply = process_client_msg(&fs, msg).await;
                    tx.send(Message::Text(serde_json::to_string(&reply)?)).await?;
                }
                Err(e) => {
                    tracing::debug!("Ignoring unparsable client message from {}: {}", addr, e);
                }
            },
            Ok(Message::Ping(d)) => {
                let _ = tx.send(Message::Pong(d)).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("WebSocket error from {}: {}", addr, e);
                break;
            }
        }
    }

    tracing::info!("Client disconnected: {}", addr);
    Ok(())
}

/// Run one client request against the file system and build its reply.
///
/// Every client path is resolved against the root before anything else
/// touches the disk; failures come back as `OperationError` carrying the path
/// exactly as the client sent it.
pub async fn process_client_msg(fs: &FileSystemService, msg: ClientMessage) -> ServerMessage {
    match msg {
        ClientMessage::Ping => ServerMessage::Pong,
        ClientMessage::ListDirectory { request_id, path } => {
            tracing::debug!("list_directory {:?}", path);
            list_directory(fs, &request_id, &path)
                .await
                .unwrap_or_else(|e| operation_error(request_id, "list_directory", &path, e))
        }
        ClientMessage::Search {
            request_id,
            path,
            term,
        } => {
            tracing::debug!("search {:?} in {:?}", term, path);
            search(fs, &request_id, &path, term)
                .await
                .unwrap_or_else(|e| operation_error(request_id, "search", &path, e))
        }
        ClientMessage::StatEntry { request_id, path } => {
            let stat = async {
                let resolved = fs.resolver().resolve_existing(&path)?;
                let metadata = fs.ops().stat(&resolved).await?;
                Ok::<_, FileSystemError>(ServerMessage::EntryInfo {
                    request_id: request_id.clone(),
                    path: resolved.relative().to_string(),
                    metadata,
                })
            };
            stat.await
                .unwrap_or_else(|e| operation_error(request_id, "stat_entry", &path, e))
        }
        ClientMessage::Classify { request_id, path } => {
            let classified = async {
                let resolved = fs.resolver().resolve_existing(&path)?;
                let content_type = fs.ops().classify_file(&resolved).await?;
                Ok::<_, FileSystemError>(ServerMessage::Classification {
                    request_id: request_id.clone(),
                    path: resolved.relative().to_string(),
                    content_type,
                })
            };
            classified
                .await
                .unwrap_or_else(|e| operation_error(request_id, "classify", &path, e))
        }
        ClientMessage::Preview { request_id, path } => {
            tracing::debug!("preview {:?}", path);
            let previewed = async {
                let resolved = fs.resolver().resolve_existing(&path)?;
                let preview = fs.preview().preview(&resolved).await?;
                Ok::<_, FileSystemError>(ServerMessage::Preview {
                    request_id: request_id.clone(),
                    path: resolved.relative().to_string(),
                    preview,
                })
            };
            previewed
                .await
                .unwrap_or_else(|e| operation_error(request_id, "preview", &path, e))
        }
        ClientMessage::ReadFile { request_id, path } => {
            let read = async {
                let resolved = fs.resolver().resolve_existing(&path)?;
                let file = fs.ops().read_file(&resolved).await?;
                Ok::<_, FileSystemError>(ServerMessage::FileContent {
                    request_id: request_id.clone(),
                    path: resolved.relative().to_string(),
                    content_type: file.content_type,
                    size: file.size,
                    data: BASE64.encode(&file.data),
                })
            };
            read.await
                .unwrap_or_else(|e| operation_error(request_id, "read_file", &path, e))
        }
        ClientMessage::DeleteFile { request_id, path } => {
            let deleted = async {
                let resolved = fs.resolver().resolve_entry(&path)?;
                fs.ops().delete_file(&resolved).await?;
                Ok::<_, FileSystemError>(ServerMessage::Deleted {
                    request_id: request_id.clone(),
                    path: resolved.relative().to_string(),
                })
            };
            deleted
                .await
                .unwrap_or_else(|e| operation_error(request_id, "delete_file", &path, e))
        }
    }
}

async fn list_directory(
    fs: &FileSystemService,
    request_id: &str,
    path: &str,
) -> Result<ServerMessage, FileSystemError> {
    let dir = fs.resolver().resolve_existing(path)?;
    let (entries, total_count, truncated) = fs.ops().list_directory(&dir).await?;
    Ok(ServerMessage::DirectoryListing {
        request_id: request_id.to_string(),
        path: dir.relative().to_string(),
        entries: fs.ops().with_metadata(entries).await,
        total_count,
        truncated,
    })
}

async fn search(
    fs: &FileSystemService,
    request_id: &str,
    path: &str,
    term: String,
) -> Result<ServerMessage, FileSystemError> {
    let dir = fs.resolver().resolve_existing(path)?;
    let (matches, truncated) = fs.search().search_files(&dir, &term).await?;
    Ok(ServerMessage::SearchResults {
        request_id: request_id.to_string(),
        path: dir.relative().to_string(),
        term,
        entries: fs.ops().with_metadata(matches).await,
        truncated,
    })
}

fn operation_error(
    request_id: String,
    operation: &str,
    path: &str,
    error: FileSystemError,
) -> ServerMessage {
    match &error {
        FileSystemError::AccessDenied { .. } => {
            tracing::warn!("{} denied for {:?}", operation, path)
        }
        _ => tracing::debug!("{} failed for {:?}: {}", operation, path, error),
    }
    ServerMessage::OperationError {
        request_id,
        operation: operation.to_string(),
        path: path.to_string(),
        error,
    }
}
