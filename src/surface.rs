use kurbo::{BezPath, Rect};

use crate::{
    assets::PreparedImage,
    color::Rgba8,
    error::{CardError, CardResult},
    layout::{FontSpec, TextMeasure},
    model::Align,
};

/// A rendered frame: RGBA8 pixels, premultiplied alpha.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRgba {
    /// Straight-alpha copy suitable for the `image` crate's compositing ops.
    pub fn to_rgba_image(&self) -> CardResult<image::RgbaImage> {
        let mut data = self.data.clone();
        if self.premultiplied {
            unpremultiply_rgba8_in_place(&mut data);
        }
        image::RgbaImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| CardError::export("frame byte length does not match its dimensions"))
    }
}

pub(crate) fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}

/// Immediate-mode 2D raster drawing capability the compositor draws
/// through. One implementation rasterizes for real
/// ([`crate::raster::RasterSurface`]); tests substitute recorders.
///
/// Any state a call sets up (clip, transform, paint) is scoped to that call:
/// nothing leaks into the next one.
pub trait Surface: TextMeasure {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Reset the whole frame to transparent.
    fn clear(&mut self);

    fn fill_rect(&mut self, rect: Rect, color: Rgba8);

    fn stroke_rect(&mut self, rect: Rect, color: Rgba8, line_width: f64);

    /// Blit the `src` rect of `image` onto the `dst` rect, optionally
    /// clipped to `clip` (in canvas coordinates). The clip applies to this
    /// blit only.
    fn draw_image(
        &mut self,
        image: &PreparedImage,
        src: Rect,
        dst: Rect,
        clip: Option<&BezPath>,
    ) -> CardResult<()>;

    /// Fill one line of text. `anchor_x` is interpreted per `align`: the
    /// left edge, center, or right edge of the rendered line. `baseline_y`
    /// is the text baseline.
    fn fill_text(
        &mut self,
        text: &str,
        anchor_x: f64,
        baseline_y: f64,
        font: &FontSpec,
        align: Align,
        color: Rgba8,
    ) -> CardResult<()>;

    /// Resolve all pending drawing and read the frame back.
    fn to_frame(&mut self) -> CardResult<FrameRgba>;
}
