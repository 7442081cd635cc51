use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, RgbaImage};

/// MIME prefix of a PNG data URL.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A surface snapshot encoded as PNG, at full physical resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl EncodedImage {
    /// Self-contained `data:image/png;base64,...` URL, as posted to the
    /// prediction endpoint.
    pub fn to_data_url(&self) -> String {
        let mut url = String::with_capacity(PNG_DATA_URL_PREFIX.len() + self.png.len() * 4 / 3 + 4);
        url.push_str(PNG_DATA_URL_PREFIX);
        STANDARD.encode_string(&self.png, &mut url);
        url
    }

    /// Write the PNG bytes to `path`.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&self.png)?;
        writer.flush()
    }
}

/// Encode an RGBA raster losslessly as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Decode the payload of a PNG data URL back to bytes. Missing base64
/// padding is tolerated.
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let (_, payload) = url.split_once(',')?;
    let mut payload = payload.trim().to_string();
    let rem = payload.len() % 4;
    if rem != 0 {
        payload.extend(std::iter::repeat('=').take(4 - rem));
    }
    STANDARD.decode(payload).ok()
}
