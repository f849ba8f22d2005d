use std::sync::Arc;

pub mod decode;
pub mod loader;

/// Decoded raster image in premultiplied RGBA8 form. All IO and decoding
/// happens at the asset seam; the compositor only ever sees prepared pixels.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Single-color image, mostly useful as a stand-in in tests.
    pub fn solid(width: u32, height: u32, rgba8_premul: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&rgba8_premul);
        }
        Self {
            width,
            height,
            rgba8_premul: Arc::new(data),
        }
    }
}
