use image::RgbaImage;

use crate::{
    assets::PreparedImage,
    color::Rgba8,
    error::{CardError, CardResult},
    model::FillMode,
    surface::{FrameRgba, unpremultiply_rgba8_in_place},
};

/// Crop marks never get shorter than this many pixels.
const MIN_MARK_LENGTH: u32 = 5;

/// Independent bleed margins, in pixels, added around the card for print.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BleedSpec {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl BleedSpec {
    pub const fn uniform(margin: u32) -> Self {
        Self {
            top: margin,
            right: margin,
            bottom: margin,
            left: margin,
        }
    }

    /// Length of each crop-mark arm: half the largest margin, floored at
    /// [`MIN_MARK_LENGTH`].
    pub fn mark_length(&self) -> u32 {
        (self.top.max(self.right).max(self.bottom).max(self.left) / 2).max(MIN_MARK_LENGTH)
    }
}

#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Flat fill used when there is no bleed background or it failed to
    /// load. Covers every pixel before anything else draws.
    pub fallback_color: Rgba8,
    pub crop_mark_color: Rgba8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            fallback_color: Rgba8::WHITE,
            crop_mark_color: Rgba8::opaque(0x66, 0x66, 0x66),
        }
    }
}

/// Extend a rendered card frame into a print-ready raster: bleed background,
/// the card blitted unscaled at `(left, top)`, and corner crop marks.
pub fn compose_bleed(
    frame: &FrameRgba,
    bleed: BleedSpec,
    background: Option<(&PreparedImage, FillMode)>,
    options: &ExportOptions,
) -> CardResult<RgbaImage> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CardError::export("cannot export an empty frame"));
    }

    let total_w = frame.width + bleed.left + bleed.right;
    let total_h = frame.height + bleed.top + bleed.bottom;

    // The flat fill goes down first so no mode, and no load failure, can
    // leave an unfilled pixel.
    let c = options.fallback_color;
    let mut out = RgbaImage::from_pixel(total_w, total_h, image::Rgba([c.r, c.g, c.b, c.a]));

    if let Some((prepared, mode)) = background {
        draw_background(&mut out, prepared, mode)?;
    }

    let card = frame.to_rgba_image()?;
    image::imageops::overlay(&mut out, &card, i64::from(bleed.left), i64::from(bleed.top));

    draw_crop_marks(&mut out, frame.width, frame.height, bleed, options.crop_mark_color);
    Ok(out)
}

fn draw_background(out: &mut RgbaImage, prepared: &PreparedImage, mode: FillMode) -> CardResult<()> {
    let bg = prepared_to_image(prepared)?;
    let (total_w, total_h) = out.dimensions();

    match mode {
        FillMode::Cover => {
            let stretched = image::imageops::resize(
                &bg,
                total_w,
                total_h,
                image::imageops::FilterType::Triangle,
            );
            image::imageops::overlay(out, &stretched, 0, 0);
        }
        FillMode::Repeat => {
            image::imageops::tile(out, &bg);
        }
        FillMode::Contain => {
            let img_ratio = f64::from(prepared.width) / f64::from(prepared.height);
            let target_ratio = f64::from(total_w) / f64::from(total_h);
            let (dw, dh) = if img_ratio > target_ratio {
                (total_w, (f64::from(total_w) / img_ratio).round() as u32)
            } else {
                ((f64::from(total_h) * img_ratio).round() as u32, total_h)
            };
            let scaled =
                image::imageops::resize(&bg, dw.max(1), dh.max(1), image::imageops::FilterType::Triangle);
            let x = i64::from((total_w - dw.min(total_w)) / 2);
            let y = i64::from((total_h - dh.min(total_h)) / 2);
            image::imageops::overlay(out, &scaled, x, y);
        }
    }
    Ok(())
}

fn prepared_to_image(prepared: &PreparedImage) -> CardResult<RgbaImage> {
    let mut data = prepared.rgba8_premul.as_ref().clone();
    unpremultiply_rgba8_in_place(&mut data);
    RgbaImage::from_raw(prepared.width, prepared.height, data)
        .ok_or_else(|| CardError::export("background byte length does not match its dimensions"))
}

/// Two short strokes per corner, extending outward from the card edges into
/// the bleed area. No full-border outline.
fn draw_crop_marks(out: &mut RgbaImage, card_w: u32, card_h: u32, bleed: BleedSpec, color: Rgba8) {
    let mark = bleed.mark_length();
    let px = image::Rgba([color.r, color.g, color.b, color.a]);

    let left = bleed.left;
    let top = bleed.top;
    let right = left + card_w;
    let bottom = top + card_h;

    // Top-left
    hline(out, left.saturating_sub(mark), left, top, px);
    vline(out, left, top.saturating_sub(mark), top, px);
    // Top-right
    hline(out, right, right + mark, top, px);
    vline(out, right, top.saturating_sub(mark), top, px);
    // Bottom-left
    hline(out, left.saturating_sub(mark), left, bottom, px);
    vline(out, left, bottom, bottom + mark, px);
    // Bottom-right
    hline(out, right, right + mark, bottom, px);
    vline(out, right, bottom, bottom + mark, px);
}

fn hline(out: &mut RgbaImage, x0: u32, x1: u32, y: u32, px: image::Rgba<u8>) {
    if y >= out.height() {
        return;
    }
    for x in x0..x1.min(out.width()) {
        out.put_pixel(x, y, px);
    }
}

fn vline(out: &mut RgbaImage, x: u32, y0: u32, y1: u32, px: image::Rgba<u8>) {
    if x >= out.width() {
        return;
    }
    for y in y0..y1.min(out.height()) {
        out.put_pixel(x, y, px);
    }
}

/// Encode the export raster as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> CardResult<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut buf),
        image::ImageFormat::Png,
    )
    .map_err(|e| CardError::export(format!("encode png: {e}")))?;
    Ok(buf)
}

/// Download-style file name for an export taken at `timestamp_millis`.
pub fn export_file_name(timestamp_millis: i64) -> String {
    format!("card-{timestamp_millis}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, color: Rgba8) -> FrameRgba {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&color.to_premul());
        }
        FrameRgba {
            width,
            height,
            data,
            premultiplied: true,
        }
    }

    fn px(img: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
        img.get_pixel(x, y).0
    }

    const CARD: Rgba8 = Rgba8::opaque(10, 200, 30);

    #[test]
    fn mark_length_is_half_largest_margin_with_floor() {
        assert_eq!(BleedSpec::uniform(20).mark_length(), 10);
        assert_eq!(
            BleedSpec {
                top: 6,
                right: 40,
                bottom: 6,
                left: 6
            }
            .mark_length(),
            20
        );
        assert_eq!(BleedSpec::uniform(4).mark_length(), 5);
        assert_eq!(BleedSpec::default().mark_length(), 5);
    }

    #[test]
    fn export_extends_canvas_and_offsets_card() {
        let frame = solid_frame(600, 800, CARD);
        let out = compose_bleed(&frame, BleedSpec::uniform(20), None, &ExportOptions::default())
            .unwrap();

        assert_eq!(out.dimensions(), (640, 840));
        // Card content sits unscaled at (20, 20).
        assert_eq!(px(&out, 20, 20), [10, 200, 30, 255]);
        assert_eq!(px(&out, 619, 819), [10, 200, 30, 255]);
        // Just outside the card: bleed fill (white), except where a crop
        // mark lands.
        assert_eq!(px(&out, 19, 19), [255, 255, 255, 255]);
    }

    #[test]
    fn crop_marks_extend_outward_by_half_the_margin() {
        let frame = solid_frame(600, 800, CARD);
        let out = compose_bleed(&frame, BleedSpec::uniform(20), None, &ExportOptions::default())
            .unwrap();

        let mark = [0x66, 0x66, 0x66, 255];
        // Horizontal arm left of the top-left corner: x in [10, 20) at y=20.
        assert_eq!(px(&out, 10, 20), mark);
        assert_eq!(px(&out, 19, 20), mark);
        assert_ne!(px(&out, 9, 20), mark);
        // Vertical arm above the top-left corner.
        assert_eq!(px(&out, 20, 10), mark);
        assert_ne!(px(&out, 20, 9), mark);
        // Bottom-right arms extend right/down from (620, 820).
        assert_eq!(px(&out, 625, 820), mark);
        assert_eq!(px(&out, 620, 825), mark);
        assert_ne!(px(&out, 631, 820), mark);
    }

    #[test]
    fn missing_background_still_fills_every_pixel() {
        let frame = solid_frame(600, 800, CARD);
        let out = compose_bleed(&frame, BleedSpec::uniform(20), None, &ExportOptions::default())
            .unwrap();
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn cover_background_stretches_over_everything() {
        let frame = solid_frame(60, 80, CARD);
        let bg = PreparedImage::solid(3, 7, [40, 40, 200, 255]);
        let out = compose_bleed(
            &frame,
            BleedSpec::uniform(10),
            Some((&bg, FillMode::Cover)),
            &ExportOptions::default(),
        )
        .unwrap();

        assert_eq!(px(&out, 0, 0), [40, 40, 200, 255]);
        assert_eq!(px(&out, 79, 99), [40, 40, 200, 255]);
    }

    #[test]
    fn contain_background_centers_and_keeps_fallback_bars() {
        // 640x840 target; a 2:1 background scales to 640x320 at y=260.
        let frame = solid_frame(600, 800, CARD);
        let bg = PreparedImage::solid(100, 50, [40, 40, 200, 255]);
        let out = compose_bleed(
            &frame,
            BleedSpec::uniform(20),
            Some((&bg, FillMode::Contain)),
            &ExportOptions::default(),
        )
        .unwrap();

        assert_eq!(px(&out, 0, 260), [40, 40, 200, 255]);
        assert_eq!(px(&out, 0, 259), [255, 255, 255, 255]);
        assert_eq!(px(&out, 0, 579), [40, 40, 200, 255]);
        assert_eq!(px(&out, 0, 580), [255, 255, 255, 255]);
    }

    #[test]
    fn repeat_background_tiles_from_the_origin() {
        let frame = solid_frame(30, 30, CARD);
        // 2x1 tile: blue column then red column.
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 255, 255]);
        data.extend_from_slice(&[255, 0, 0, 255]);
        let bg = PreparedImage {
            width: 2,
            height: 1,
            rgba8_premul: std::sync::Arc::new(data),
        };
        let out = compose_bleed(
            &frame,
            BleedSpec::uniform(10),
            Some((&bg, FillMode::Repeat)),
            &ExportOptions::default(),
        )
        .unwrap();

        assert_eq!(px(&out, 0, 0), [0, 0, 255, 255]);
        assert_eq!(px(&out, 1, 0), [255, 0, 0, 255]);
        assert_eq!(px(&out, 2, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn png_encoding_round_trips() {
        let frame = solid_frame(8, 8, CARD);
        let out =
            compose_bleed(&frame, BleedSpec::uniform(5), None, &ExportOptions::default()).unwrap();
        let png = encode_png(&out).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), out.dimensions());
        assert_eq!(px(&decoded, 5, 5), [10, 200, 30, 255]);
    }

    #[test]
    fn file_name_embeds_the_timestamp() {
        assert_eq!(export_file_name(1700000000123), "card-1700000000123.png");
    }
}
