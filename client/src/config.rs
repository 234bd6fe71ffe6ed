use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasError, Grid, DEFAULT_GRID_SIZE};
use crate::net::websocket_url;
use crate::session::DEFAULT_CELL_SIZE;
use crate::sync::SyncOptions;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    #[default]
    Json,
    Binary,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL or a `/s/{room}` share link.
    pub server_url: String,
    pub room_id: Option<String>,
    pub wire_format: WireFormat,
    pub grid_width: u32,
    pub grid_height: u32,
    pub cell_size: u32,
    pub adopt_unsolicited_state: bool,
    pub reconnect_delay_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            room_id: None,
            wire_format: WireFormat::Json,
            grid_width: DEFAULT_GRID_SIZE,
            grid_height: DEFAULT_GRID_SIZE,
            cell_size: DEFAULT_CELL_SIZE,
            adopt_unsolicited_state: false,
            reconnect_delay_ms: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn websocket_url(&self) -> String {
        websocket_url(&self.server_url, self.room_id.as_deref())
    }

    pub fn grid(&self) -> Result<Grid, CanvasError> {
        Grid::new(self.grid_width, self.grid_height)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            adopt_unsolicited_state: self.adopt_unsolicited_state,
        }
    }

    pub fn reconnect_delay(&self) -> Option<Duration> {
        self.reconnect_delay_ms.map(Duration::from_millis)
    }
}
