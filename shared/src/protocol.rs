use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::{Cell, PaintColor, Snapshot};

/// Every message exchanged through the relay. The relay itself never looks
/// inside; peers send and receive the same enum.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    DrawPixel {
        x: i32,
        y: i32,
        color: PaintColor,
        size: u32,
    },
    ClearCanvas,
    UndoAction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<Snapshot>,
    },
    RedoAction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<Snapshot>,
    },
    NewClientReady,
    RequestCanvasState,
    SendCanvasState {
        snapshot: Snapshot,
    },
    LoadCanvasState {
        snapshot: Snapshot,
    },
}

impl RelayMessage {
    pub fn draw(cell: Cell, color: PaintColor, size: u32) -> Self {
        RelayMessage::DrawPixel {
            x: cell.x,
            y: cell.y,
            color,
            size,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::DrawPixel { .. } => "draw_pixel",
            RelayMessage::ClearCanvas => "clear_canvas",
            RelayMessage::UndoAction { .. } => "undo_action",
            RelayMessage::RedoAction { .. } => "redo_action",
            RelayMessage::NewClientReady => "new_client_ready",
            RelayMessage::RequestCanvasState => "request_canvas_state",
            RelayMessage::SendCanvasState { .. } => "send_canvas_state",
            RelayMessage::LoadCanvasState { .. } => "load_canvas_state",
        }
    }
}

pub fn encode_text(message: &RelayMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

pub fn decode_text(text: &str) -> Result<RelayMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode_binary(message: &RelayMessage) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::encode_to_vec(message, bincode::config::standard())
}

pub fn decode_binary(payload: &[u8]) -> Result<RelayMessage, bincode::error::DecodeError> {
    bincode::decode_from_slice::<RelayMessage, _>(payload, bincode::config::standard())
        .map(|(message, _)| message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{encode_png, Rgba};

    #[test]
    fn draw_pixel_json_shape() {
        let message = RelayMessage::draw(
            Cell::new(3, 4),
            PaintColor::Color(Rgba::opaque(255, 0, 0)),
            2,
        );
        let value: serde_json::Value = serde_json::from_str(&encode_text(&message).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "draw_pixel", "x": 3, "y": 4, "color": "#ff0000", "size": 2})
        );
    }

    #[test]
    fn eraser_marker_decodes() {
        let message =
            decode_text(r#"{"type":"draw_pixel","x":0,"y":1,"color":"erase","size":3}"#).unwrap();
        assert_eq!(message, RelayMessage::draw(Cell::new(0, 1), PaintColor::Erase, 3));
    }

    #[test]
    fn unit_kinds_and_optional_snapshot() {
        assert_eq!(
            decode_text(r#"{"type":"clear_canvas"}"#).unwrap(),
            RelayMessage::ClearCanvas
        );
        assert_eq!(
            decode_text(r#"{"type":"undo_action"}"#).unwrap(),
            RelayMessage::UndoAction { snapshot: None }
        );
        assert_eq!(
            encode_text(&RelayMessage::RedoAction { snapshot: None }).unwrap(),
            r#"{"type":"redo_action"}"#
        );
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!(decode_text(r#"{"type":"chat","text":"hi"}"#).is_err());
        assert!(decode_text("not json").is_err());
        assert!(decode_binary(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn snapshot_messages_survive_both_codecs() {
        let snapshot = encode_png(1, 1, &[1, 2, 3, 4]).unwrap();
        let message = RelayMessage::SendCanvasState { snapshot };
        let text = encode_text(&message).unwrap();
        assert!(text.contains("data:image/png;base64,"));
        assert_eq!(decode_text(&text).unwrap(), message);
        let binary = encode_binary(&message).unwrap();
        assert_eq!(decode_binary(&binary).unwrap(), message);
    }
}
