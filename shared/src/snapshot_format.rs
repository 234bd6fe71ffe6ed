use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bincode::{Decode, Encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";
/// Largest image, in pixels, that is encoded or decoded. A 2000 x 2000 grid
/// fits at one pixel per cell.
pub const MAX_SNAPSHOT_PIXELS: u64 = 4096 * 4096;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not a PNG image")]
    InvalidData,
    #[error("unsupported PNG layout {color:?}/{depth:?}")]
    UnsupportedLayout {
        color: png::ColorType,
        depth: png::BitDepth,
    },
    #[error("pixel buffer of {actual} bytes does not match {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        actual: usize,
    },
    #[error("{width}x{height} image exceeds the snapshot pixel limit")]
    TooLarge { width: u64, height: u64 },
    #[error("invalid data url: {0}")]
    DataUrl(String),
    #[error("png decode failed: {0}")]
    Decode(#[from] png::DecodingError),
    #[error("png encode failed: {0}")]
    Encode(#[from] png::EncodingError),
}

/// A PNG-encoded full canvas image. Travels as raw bytes in binary frames and
/// as a `data:` URL in JSON frames.
#[derive(Encode, Decode, Clone, PartialEq, Eq)]
pub struct Snapshot(Vec<u8>);

impl Snapshot {
    pub fn from_png_bytes(bytes: Vec<u8>) -> Result<Self, SnapshotError> {
        if !bytes.starts_with(&PNG_SIGNATURE) {
            return Err(SnapshotError::InvalidData);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&self.0))
    }

    pub fn from_data_url(url: &str) -> Result<Self, SnapshotError> {
        let payload = url
            .trim()
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| SnapshotError::DataUrl("expected a base64 PNG data url".into()))?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|error| SnapshotError::DataUrl(error.to_string()))?;
        Self::from_png_bytes(bytes)
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Snapshot({} bytes)", self.0.len())
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let url = String::deserialize(deserializer)?;
        Snapshot::from_data_url(&url).map_err(serde::de::Error::custom)
    }
}

/// Straight-alpha RGBA8 pixels, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let index = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[index],
            self.pixels[index + 1],
            self.pixels[index + 2],
            self.pixels[index + 3],
        ]
    }
}

/// Rejects empty images and images above `MAX_SNAPSHOT_PIXELS`.
pub fn check_dimensions(width: u64, height: u64) -> Result<(), SnapshotError> {
    if width == 0 || height == 0 {
        return Err(SnapshotError::InvalidData);
    }
    match width.checked_mul(height) {
        Some(pixels) if pixels <= MAX_SNAPSHOT_PIXELS => Ok(()),
        _ => Err(SnapshotError::TooLarge { width, height }),
    }
}

pub fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Result<Snapshot, SnapshotError> {
    if rgba.len() != width as usize * height as usize * 4 {
        return Err(SnapshotError::BufferSize {
            width,
            height,
            actual: rgba.len(),
        });
    }
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgba)?;
    }
    Ok(Snapshot(buf))
}

pub fn decode_png(snapshot: &Snapshot) -> Result<DecodedImage, SnapshotError> {
    let mut decoder = png::Decoder::new(Cursor::new(snapshot.as_bytes()));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    let header = reader.info();
    check_dimensions(header.width.into(), header.height.into())?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    buf.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(SnapshotError::UnsupportedLayout {
            color: info.color_type,
            depth: info.bit_depth,
        });
    }
    let pixels = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => buf
            .chunks_exact(2)
            .flat_map(|px| [px[0], px[0], px[0], px[1]])
            .collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        color => {
            return Err(SnapshotError::UnsupportedLayout {
                color,
                depth: info.bit_depth,
            })
        }
    };
    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        pixels,
    })
}
