use pixelboard_shared::{
    decode_binary, decode_text, sanitize_size, Cell, PaintColor, RelayMessage, Rgba, Snapshot,
    SnapshotError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::canvas::{CanvasError, CanvasStore};
use crate::session::{EditorSession, Tool};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("connection closed")]
    Closed,
    #[error("failed to encode {kind}: {reason}")]
    Encode { kind: &'static str, reason: String },
}

/// Outbound half of a relay connection.
pub trait Transport {
    fn send(&mut self, message: &RelayMessage) -> Result<(), TransportError>;
}

/// Where a mutation came from. Only local mutations are sent to the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Disconnected,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SyncOptions {
    /// Load `send_canvas_state` snapshots even when this client did not ask.
    pub adopt_unsolicited_state: bool,
}

/// Applies local edits to the canvas and forwards them to the relay, and
/// applies peer edits without forwarding them again.
pub struct SyncClient<T> {
    store: CanvasStore,
    transport: T,
    state: ConnectionState,
    options: SyncOptions,
    stroke_active: bool,
    awaiting_state: bool,
    // Set once any edit or peer state has been applied; a client that has
    // seen nothing yet does not answer state requests.
    holds_board: bool,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(store: CanvasStore, transport: T, options: SyncOptions) -> Self {
        Self {
            store,
            transport,
            state: ConnectionState::Connecting,
            options,
            stroke_active: false,
            awaiting_state: false,
            holds_board: false,
        }
    }

    pub fn store(&self) -> &CanvasStore {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Swaps in a fresh connection; the client waits for `on_open` again.
    pub fn replace_transport(&mut self, transport: T) -> T {
        self.state = ConnectionState::Connecting;
        std::mem::replace(&mut self.transport, transport)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_awaiting_state(&self) -> bool {
        self.awaiting_state
    }

    pub fn holds_board(&self) -> bool {
        self.holds_board
    }

    pub fn on_open(&mut self) {
        info!("relay connection ready");
        self.state = ConnectionState::Ready;
        self.awaiting_state = true;
        self.send(RelayMessage::NewClientReady);
        self.send(RelayMessage::RequestCanvasState);
    }

    pub fn on_close(&mut self) {
        if self.state != ConnectionState::Disconnected {
            info!("relay connection lost, continuing offline");
        }
        self.state = ConnectionState::Disconnected;
        self.awaiting_state = false;
    }

    pub fn pointer_down(&mut self, session: &mut EditorSession, cell: Cell) {
        if session.tool == Tool::PickColor {
            if let Some(color) = self.store.pixel(cell) {
                session.pick(Rgba::opaque(color.r, color.g, color.b));
            }
            return;
        }
        self.store.begin_stroke();
        self.stroke_active = true;
        self.draw(
            cell,
            session.paint_color(None),
            session.brush_size(),
            Origin::Local,
        );
    }

    pub fn pointer_move(&mut self, session: &EditorSession, cell: Cell) {
        if !self.stroke_active {
            return;
        }
        self.draw(
            cell,
            session.paint_color(None),
            session.brush_size(),
            Origin::Local,
        );
    }

    pub fn pointer_up(&mut self) {
        self.stroke_active = false;
    }

    pub fn draw(&mut self, cell: Cell, color: PaintColor, size: u32, origin: Origin) {
        let size = sanitize_size(size);
        self.store.paint(cell, color, size);
        self.holds_board = true;
        if origin == Origin::Local {
            self.begin_local_edit();
            self.send(RelayMessage::draw(cell, color, size));
        }
    }

    pub fn clear(&mut self, origin: Origin) {
        self.store.clear();
        self.holds_board = true;
        if origin == Origin::Local {
            self.stroke_active = false;
            self.begin_local_edit();
            self.send(RelayMessage::ClearCanvas);
        }
    }

    /// Returns whether the undo stack had anything to restore.
    pub fn undo(&mut self, origin: Origin) -> bool {
        if origin == Origin::Local {
            self.stroke_active = false;
        }
        if !self.store.undo() {
            return false;
        }
        self.holds_board = true;
        if origin == Origin::Local {
            self.begin_local_edit();
            let snapshot = self.snapshot_for_peers();
            self.send(RelayMessage::UndoAction { snapshot });
        }
        true
    }

    pub fn redo(&mut self, origin: Origin) -> bool {
        if origin == Origin::Local {
            self.stroke_active = false;
        }
        if !self.store.redo() {
            return false;
        }
        self.holds_board = true;
        if origin == Origin::Local {
            self.begin_local_edit();
            let snapshot = self.snapshot_for_peers();
            self.send(RelayMessage::RedoAction { snapshot });
        }
        true
    }

    /// Grid size is per editor and is never sent to peers.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CanvasError> {
        self.store.resize(width, height)?;
        self.stroke_active = false;
        Ok(())
    }

    pub fn export_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        self.store.export_snapshot()
    }

    pub fn export_image(&self, cell_size: u32) -> Result<Snapshot, SnapshotError> {
        self.store.export_image(cell_size)
    }

    pub fn handle_text(&mut self, text: &str) {
        match decode_text(text) {
            Ok(message) => self.handle_message(message),
            Err(error) => debug!(%error, "ignoring undecodable text frame"),
        }
    }

    pub fn handle_binary(&mut self, payload: &[u8]) {
        match decode_binary(payload) {
            Ok(message) => self.handle_message(message),
            Err(error) => debug!(%error, "ignoring undecodable binary frame"),
        }
    }

    pub fn handle_message(&mut self, message: RelayMessage) {
        debug!(kind = message.kind(), "inbound message");
        match message {
            RelayMessage::DrawPixel { x, y, color, size } => {
                self.draw(Cell::new(x, y), color, size, Origin::Remote);
            }
            RelayMessage::ClearCanvas => self.clear(Origin::Remote),
            RelayMessage::UndoAction {
                snapshot: Some(snapshot),
            }
            | RelayMessage::RedoAction {
                snapshot: Some(snapshot),
            } => self.apply_snapshot(&snapshot),
            RelayMessage::UndoAction { snapshot: None } => {
                self.undo(Origin::Remote);
            }
            RelayMessage::RedoAction { snapshot: None } => {
                self.redo(Origin::Remote);
            }
            RelayMessage::NewClientReady => info!("peer joined"),
            RelayMessage::RequestCanvasState => {
                if !self.holds_board {
                    debug!("not answering state request with an untouched canvas");
                    return;
                }
                if let Some(snapshot) = self.snapshot_for_peers() {
                    self.send(RelayMessage::SendCanvasState { snapshot });
                }
            }
            RelayMessage::SendCanvasState { snapshot }
            | RelayMessage::LoadCanvasState { snapshot } => {
                if !(self.awaiting_state || self.options.adopt_unsolicited_state) {
                    debug!("ignoring unsolicited canvas state");
                    return;
                }
                self.awaiting_state = false;
                self.apply_snapshot(&snapshot);
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        match self.store.load_snapshot(snapshot) {
            Ok(()) => self.holds_board = true,
            Err(error) => warn!(%error, "ignoring canvas snapshot"),
        }
    }

    fn snapshot_for_peers(&self) -> Option<Snapshot> {
        match self.store.export_snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                warn!(%error, "failed to encode canvas snapshot");
                None
            }
        }
    }

    // Once this editor has changed the canvas itself, a late state reply
    // must not overwrite that work.
    fn begin_local_edit(&mut self) {
        self.awaiting_state = false;
    }

    fn send(&mut self, message: RelayMessage) {
        if self.state != ConnectionState::Ready {
            debug!(kind = message.kind(), state = ?self.state, "dropping outbound message");
            return;
        }
        if let Err(error) = self.transport.send(&message) {
            warn!(kind = message.kind(), %error, "failed to send message");
        }
    }
}
