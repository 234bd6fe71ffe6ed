mod app;
pub mod canvas;
pub mod config;
mod net;
pub mod session;
pub mod sync;
mod ws;

pub use app::{spawn_editor, EditorError, EditorHandle};
pub use canvas::{CanvasError, CanvasStore, Grid};
pub use config::{ClientConfig, WireFormat};
pub use net::websocket_url;
pub use session::{EditorSession, Tool};
pub use sync::{ConnectionState, Origin, SyncClient, SyncOptions, Transport, TransportError};
pub use ws::{connect_ws, WsEvent, WsSender};
