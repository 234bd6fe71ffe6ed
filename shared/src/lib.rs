use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

pub mod color;
pub mod protocol;
pub mod snapshot_format;

pub use color::{shade_color, PaintColor, Rgba, BASIC_COLORS};
pub use protocol::{decode_binary, decode_text, encode_binary, encode_text, RelayMessage};
pub use snapshot_format::{
    check_dimensions, decode_png, encode_png, DecodedImage, Snapshot, SnapshotError,
    MAX_SNAPSHOT_PIXELS,
};

pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 10;

/// A logical grid coordinate. Signed so that remote draw messages pointing
/// off the left/top edge clip instead of failing to decode.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: u32, dy: u32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(i32::try_from(dx).ok()?)?,
            y: self.y.checked_add(i32::try_from(dy).ok()?)?,
        })
    }
}

pub fn sanitize_size(size: u32) -> u32 {
    size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE)
}
