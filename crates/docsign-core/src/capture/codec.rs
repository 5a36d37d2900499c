//! PNG data URLs
//!
//! The normalized image-data string is `data:image/png;base64,<payload>`
//! where the payload is a standard-alphabet base64 PNG.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::surface::Surface;
use super::CaptureError;

pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Encode a surface as an RGBA PNG
pub fn encode_png(surface: &Surface) -> Result<Vec<u8>, CaptureError> {
    let mut bytes = Vec::new();
    let mut encoder = png::Encoder::new(&mut bytes, surface.width(), surface.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    writer
        .write_image_data(surface.as_rgba())
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    Ok(bytes)
}

/// Decode any 8-bit or 16-bit PNG into an RGBA surface
pub fn decode_png(bytes: &[u8]) -> Result<Surface, CaptureError> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| CaptureError::Decode(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| CaptureError::Decode(e.to_string()))?;
    let data = &buf[..info.buffer_size()];

    let rgba: Vec<u8> = match info.color_type {
        png::ColorType::Rgba => data.to_vec(),
        png::ColorType::Rgb => data
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => data
            .chunks_exact(2)
            .flat_map(|px| [px[0], px[0], px[0], px[1]])
            .collect(),
        png::ColorType::Grayscale => data.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        png::ColorType::Indexed => {
            return Err(CaptureError::Decode(
                "indexed color was not expanded".to_string(),
            ))
        }
    };

    Surface::from_rgba(info.width, info.height, rgba)
        .ok_or_else(|| CaptureError::Decode("pixel buffer does not match image size".to_string()))
}

/// Serialize a surface to a normalized image-data string
pub fn to_data_url(surface: &Surface) -> Result<String, CaptureError> {
    let png = encode_png(surface)?;
    Ok(format!("{}{}", DATA_URL_PREFIX, BASE64.encode(png)))
}

/// Raw PNG bytes of an image-data string
pub fn data_url_bytes(data_url: &str) -> Result<Vec<u8>, CaptureError> {
    let payload = data_url
        .trim()
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| CaptureError::Decode("not a PNG data URL".to_string()))?;
    BASE64
        .decode(payload)
        .map_err(|e| CaptureError::Decode(e.to_string()))
}

/// Decode an image-data string back into a surface
pub fn from_data_url(data_url: &str) -> Result<Surface, CaptureError> {
    decode_png(&data_url_bytes(data_url)?)
}

/// Whether a value is a normalized image-data string: the PNG data URL prefix
/// followed by valid base64 of a payload that starts with the PNG signature
pub fn is_image_data(value: &str) -> bool {
    data_url_bytes(value)
        .map(|bytes| bytes.starts_with(&PNG_MAGIC))
        .unwrap_or(false)
}

/// Intrinsic `(width, height)` of an image-data string, read from the PNG header
pub fn image_dimensions(data_url: &str) -> Option<(u32, u32)> {
    let bytes = data_url_bytes(data_url).ok()?;
    let decoder = png::Decoder::new(bytes.as_slice());
    let reader = decoder.read_info().ok()?;
    let info = reader.info();
    Some((info.width, info.height))
}
