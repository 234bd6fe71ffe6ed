use std::future::pending;

use pixelboard_shared::{Cell, Rgba, Snapshot, SnapshotError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{info, warn};

use crate::canvas::{CanvasError, CanvasStore};
use crate::config::{ClientConfig, WireFormat};
use crate::session::{EditorSession, Tool};
use crate::sync::{ConnectionState, Origin, SyncClient, TransportError};
use crate::ws::{connect_ws, WsEvent, WsSender};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("editor task has stopped")]
    Stopped,
    #[error(transparent)]
    Canvas(#[from] CanvasError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

enum Command {
    PointerDown(Cell),
    PointerMove(Cell),
    PointerUp,
    Clear,
    Undo(oneshot::Sender<bool>),
    Redo(oneshot::Sender<bool>),
    Resize {
        width: u32,
        height: u32,
        reply: oneshot::Sender<Result<(), CanvasError>>,
    },
    SetColor(Rgba),
    SetBrushSize(u32),
    SetShade(u8),
    SetTool(Tool),
    SetZoom(f64),
    Session(oneshot::Sender<EditorSession>),
    Pixel {
        cell: Cell,
        reply: oneshot::Sender<Option<Rgba>>,
    },
    Snapshot(oneshot::Sender<Result<Snapshot, SnapshotError>>),
    ExportImage(oneshot::Sender<Result<Snapshot, SnapshotError>>),
    ConnectionState(oneshot::Sender<ConnectionState>),
    Shutdown,
}

/// Cloneable front door to a running editor. Every call is queued onto the
/// editor task, which is the only place the canvas is mutated.
#[derive(Clone)]
pub struct EditorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl EditorHandle {
    pub fn pointer_down(&self, cell: Cell) -> Result<(), EditorError> {
        self.post(Command::PointerDown(cell))
    }

    pub fn pointer_move(&self, cell: Cell) -> Result<(), EditorError> {
        self.post(Command::PointerMove(cell))
    }

    pub fn pointer_up(&self) -> Result<(), EditorError> {
        self.post(Command::PointerUp)
    }

    pub fn clear(&self) -> Result<(), EditorError> {
        self.post(Command::Clear)
    }

    pub async fn undo(&self) -> Result<bool, EditorError> {
        self.request(Command::Undo).await
    }

    pub async fn redo(&self) -> Result<bool, EditorError> {
        self.request(Command::Redo).await
    }

    pub async fn resize(&self, width: u32, height: u32) -> Result<(), EditorError> {
        let result = self
            .request(|reply| Command::Resize {
                width,
                height,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub fn set_color(&self, color: Rgba) -> Result<(), EditorError> {
        self.post(Command::SetColor(color))
    }

    pub fn set_brush_size(&self, size: u32) -> Result<(), EditorError> {
        self.post(Command::SetBrushSize(size))
    }

    pub fn set_shade(&self, amount: u8) -> Result<(), EditorError> {
        self.post(Command::SetShade(amount))
    }

    pub fn set_tool(&self, tool: Tool) -> Result<(), EditorError> {
        self.post(Command::SetTool(tool))
    }

    pub fn set_zoom(&self, zoom: f64) -> Result<(), EditorError> {
        self.post(Command::SetZoom(zoom))
    }

    pub async fn session(&self) -> Result<EditorSession, EditorError> {
        self.request(Command::Session).await
    }

    pub async fn pixel(&self, cell: Cell) -> Result<Option<Rgba>, EditorError> {
        self.request(|reply| Command::Pixel { cell, reply }).await
    }

    /// Canvas PNG at one pixel per cell.
    pub async fn snapshot(&self) -> Result<Snapshot, EditorError> {
        Ok(self.request(Command::Snapshot).await??)
    }

    /// Canvas PNG at the session's cell size, for saving to disk.
    pub async fn export_image(&self) -> Result<Snapshot, EditorError> {
        Ok(self.request(Command::ExportImage).await??)
    }

    pub async fn connection_state(&self) -> Result<ConnectionState, EditorError> {
        self.request(Command::ConnectionState).await
    }

    pub fn shutdown(&self) -> Result<(), EditorError> {
        self.post(Command::Shutdown)
    }

    fn post(&self, command: Command) -> Result<(), EditorError> {
        self.tx.send(command).map_err(|_| EditorError::Stopped)
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, EditorError> {
        let (reply, response) = oneshot::channel();
        self.post(command(reply))?;
        response.await.map_err(|_| EditorError::Stopped)
    }
}

/// Connects to the relay and starts the editor task. Without a reconnect
/// delay a failed first connection is an error; with one, the editor starts
/// offline and keeps retrying.
pub async fn spawn_editor(config: ClientConfig) -> Result<EditorHandle, EditorError> {
    let grid = config.grid()?;
    let url = config.websocket_url();
    let reconnect_delay = config.reconnect_delay();
    let (sender, events, retry_at) = match connect_ws(&url, config.wire_format).await {
        Ok((sender, events)) => (sender, Some(events), None),
        Err(error) => match reconnect_delay {
            Some(delay) => {
                warn!(%error, "starting offline");
                (
                    WsSender::detached(config.wire_format),
                    None,
                    Some(Instant::now() + delay),
                )
            }
            None => return Err(error.into()),
        },
    };

    let mut sync = SyncClient::new(CanvasStore::new(grid), sender, config.sync_options());
    if events.is_none() {
        sync.on_close();
    }
    let editor = Editor {
        sync,
        session: EditorSession::with_cell_size(config.cell_size),
        url,
        wire_format: config.wire_format,
        reconnect_delay,
    };
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(editor.run(rx, events, retry_at));
    Ok(EditorHandle { tx })
}

enum Step {
    Command(Option<Command>),
    Event(Option<WsEvent>),
    Retry,
}

struct Editor {
    sync: SyncClient<WsSender>,
    session: EditorSession,
    url: String,
    wire_format: WireFormat,
    reconnect_delay: Option<Duration>,
}

impl Editor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: Option<mpsc::UnboundedReceiver<WsEvent>>,
        mut retry_at: Option<Instant>,
    ) {
        loop {
            let step = tokio::select! {
                command = commands.recv() => Step::Command(command),
                event = next_event(&mut events) => Step::Event(event),
                _ = retry_after(retry_at) => Step::Retry,
            };
            match step {
                Step::Command(None) | Step::Command(Some(Command::Shutdown)) => break,
                Step::Command(Some(command)) => self.apply(command),
                Step::Event(Some(event)) => {
                    if self.on_event(event) {
                        retry_at = self.reconnect_delay.map(|delay| Instant::now() + delay);
                    }
                }
                Step::Event(None) => events = None,
                Step::Retry => {
                    retry_at = None;
                    match connect_ws(&self.url, self.wire_format).await {
                        Ok((sender, receiver)) => {
                            self.sync.replace_transport(sender);
                            events = Some(receiver);
                        }
                        Err(error) => {
                            warn!(%error, "reconnect failed");
                            retry_at = self.reconnect_delay.map(|delay| Instant::now() + delay);
                        }
                    }
                }
            }
        }
        info!("editor stopped");
    }

    /// Returns true when the connection was lost.
    fn on_event(&mut self, event: WsEvent) -> bool {
        match event {
            WsEvent::Open => self.sync.on_open(),
            WsEvent::Text(text) => self.sync.handle_text(&text),
            WsEvent::Binary(payload) => self.sync.handle_binary(&payload),
            WsEvent::Error(error) => warn!(%error, "WS error"),
            WsEvent::Close => {
                self.sync.on_close();
                return true;
            }
        }
        false
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::PointerDown(cell) => self.sync.pointer_down(&mut self.session, cell),
            Command::PointerMove(cell) => self.sync.pointer_move(&self.session, cell),
            Command::PointerUp => self.sync.pointer_up(),
            Command::Clear => self.sync.clear(Origin::Local),
            Command::Undo(reply) => {
                let _ = reply.send(self.sync.undo(Origin::Local));
            }
            Command::Redo(reply) => {
                let _ = reply.send(self.sync.redo(Origin::Local));
            }
            Command::Resize {
                width,
                height,
                reply,
            } => {
                let _ = reply.send(self.sync.resize(width, height));
            }
            Command::SetColor(color) => self.session.color = color,
            Command::SetBrushSize(size) => self.session.set_brush_size(size),
            Command::SetShade(amount) => self.session.set_shade(amount),
            Command::SetTool(tool) => self.session.tool = tool,
            Command::SetZoom(zoom) => self.session.set_zoom(zoom),
            Command::Session(reply) => {
                let _ = reply.send(self.session.clone());
            }
            Command::Pixel { cell, reply } => {
                let _ = reply.send(self.sync.store().pixel(cell));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.sync.export_snapshot());
            }
            Command::ExportImage(reply) => {
                let _ = reply.send(self.sync.export_image(self.session.cell_size()));
            }
            Command::ConnectionState(reply) => {
                let _ = reply.send(self.sync.connection_state());
            }
            Command::Shutdown => {}
        }
    }
}

async fn next_event(events: &mut Option<mpsc::UnboundedReceiver<WsEvent>>) -> Option<WsEvent> {
    match events {
        Some(receiver) => receiver.recv().await,
        None => pending().await,
    }
}

async fn retry_after(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use pixelboard_shared::decode_png;

    use super::*;

    fn unreachable(reconnect_delay_ms: Option<u64>) -> ClientConfig {
        ClientConfig {
            server_url: "http://127.0.0.1:1".to_string(),
            grid_width: 8,
            grid_height: 8,
            cell_size: 5,
            reconnect_delay_ms,
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn refuses_to_start_without_server() {
        assert!(matches!(
            spawn_editor(unreachable(None)).await,
            Err(EditorError::Transport(TransportError::Connect { .. }))
        ));
    }

    #[tokio::test]
    async fn invalid_grid_is_rejected_before_connecting() {
        let config = ClientConfig {
            grid_width: 1,
            ..unreachable(Some(10))
        };
        assert!(matches!(
            spawn_editor(config).await,
            Err(EditorError::Canvas(_))
        ));
    }

    #[tokio::test]
    async fn offline_editor_still_edits() {
        let editor = spawn_editor(unreachable(Some(60_000))).await.unwrap();
        assert_eq!(
            editor.connection_state().await.unwrap(),
            ConnectionState::Disconnected
        );

        let red = Rgba::opaque(255, 0, 0);
        editor.set_color(red).unwrap();
        editor.set_brush_size(2).unwrap();
        editor.pointer_down(Cell::new(1, 1)).unwrap();
        editor.pointer_move(Cell::new(4, 1)).unwrap();
        editor.pointer_up().unwrap();
        assert_eq!(editor.pixel(Cell::new(5, 2)).await.unwrap(), Some(red));
        assert_eq!(editor.session().await.unwrap().brush_size(), 2);

        assert!(editor.undo().await.unwrap());
        assert_eq!(editor.pixel(Cell::new(5, 2)).await.unwrap(), Some(Rgba::TRANSPARENT));
        assert!(editor.redo().await.unwrap());
        assert!(!editor.redo().await.unwrap());

        assert!(matches!(
            editor.resize(3, 3).await,
            Err(EditorError::Canvas(CanvasError::InvalidDimensions { .. }))
        ));
        let image = decode_png(&editor.export_image().await.unwrap()).unwrap();
        assert_eq!((image.width, image.height), (40, 40));

        editor.shutdown().unwrap();
        // Queued after the shutdown, so its reply is dropped with the queue.
        assert!(matches!(
            editor.connection_state().await,
            Err(EditorError::Stopped)
        ));
        assert!(matches!(editor.clear(), Err(EditorError::Stopped)));
    }
}
