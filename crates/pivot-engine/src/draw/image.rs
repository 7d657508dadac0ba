use crate::coords::PixelSize;

use super::DrawError;

/// Decoded image in straight-alpha RGBA8, row-major.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub size: PixelSize,
    pub rgba: Vec<u8>,
}

/// Device-independent image decoding factory.
#[derive(Debug, Default, Clone)]
pub struct ImageFactory;

impl ImageFactory {
    pub fn new() -> Self {
        Self
    }

    /// Decodes PNG, JPEG or BMP bytes. The format is sniffed from the data.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DrawError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::trace!("decoded {width}x{height} image");

        Ok(DecodedImage {
            size: PixelSize::new(width, height),
            rgba: rgba.into_raw(),
        })
    }
}
