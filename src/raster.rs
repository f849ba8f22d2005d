use std::{cell::RefCell, collections::HashMap, sync::Arc};

use kurbo::{BezPath, Rect};

use crate::{
    assets::PreparedImage,
    color::Rgba8,
    error::{CardError, CardResult},
    layout::{FontSpec, TextMeasure},
    model::{Align, FontStyle, FontWeight},
    surface::{FrameRgba, Surface},
};

/// RGBA8 brush color carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct TextBrushRgba8 {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

/// CPU raster surface: a premultiplied RGBA8 pixmap drawn through
/// `vello_cpu`, with Parley shaping for text measurement and fills.
///
/// Fonts are registered per family name; a family the template names but
/// nobody registered falls back to the default font.
pub struct RasterSurface {
    width: u32,
    height: u32,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    fonts: HashMap<String, FontEntry>,
    default_font: FontEntry,
    text: RefCell<TextEngine>,
    image_cache: RefCell<HashMap<usize, vello_cpu::Image>>,
}

#[derive(Clone)]
struct FontEntry {
    data: vello_cpu::peniko::FontData,
    /// Family name Parley registered for these bytes.
    parley_family: String,
}

struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl TextEngine {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    fn register(&mut self, bytes: &[u8]) -> CardResult<String> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.to_vec()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| CardError::asset("no font families registered from font bytes"))?;
        self.font_ctx
            .collection
            .family_name(family_id)
            .map(str::to_string)
            .ok_or_else(|| CardError::asset("registered font family has no name"))
    }

    /// Shape one line of already-wrapped text.
    fn layout_line(
        &mut self,
        text: &str,
        family: &str,
        font: &FontSpec,
        brush: TextBrushRgba8,
    ) -> parley::Layout<TextBrushRgba8> {
        let mut builder = self.layout_ctx.ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family.to_string())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(font.size as f32));
        builder.push_default(parley::style::StyleProperty::FontWeight(match font.weight {
            FontWeight::Normal => parley::style::FontWeight::NORMAL,
            FontWeight::Bold => parley::style::FontWeight::BOLD,
        }));
        builder.push_default(parley::style::StyleProperty::FontStyle(match font.style {
            FontStyle::Normal => parley::style::FontStyle::Normal,
            FontStyle::Italic => parley::style::FontStyle::Italic,
        }));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }
}

impl RasterSurface {
    /// Create a surface with the given default font (raw TTF/OTF bytes).
    pub fn new(width: u32, height: u32, default_font: Vec<u8>) -> CardResult<Self> {
        let width_u16: u16 = width
            .try_into()
            .map_err(|_| CardError::draw("surface width exceeds u16"))?;
        let height_u16: u16 = height
            .try_into()
            .map_err(|_| CardError::draw("surface height exceeds u16"))?;
        if width == 0 || height == 0 {
            return Err(CardError::draw("surface dimensions must be > 0"));
        }

        let mut text = TextEngine::new();
        let parley_family = text.register(&default_font)?;
        let default_font = FontEntry {
            data: vello_cpu::peniko::FontData::new(
                vello_cpu::peniko::Blob::from(default_font),
                0,
            ),
            parley_family,
        };

        Ok(Self {
            width,
            height,
            ctx: vello_cpu::RenderContext::new(width_u16, height_u16),
            pixmap: vello_cpu::Pixmap::new(width_u16, height_u16),
            fonts: HashMap::new(),
            default_font,
            text: RefCell::new(text),
            image_cache: RefCell::new(HashMap::new()),
        })
    }

    /// Register a font under the family name templates refer to it by.
    pub fn register_font(&mut self, family: impl Into<String>, bytes: Vec<u8>) -> CardResult<()> {
        let parley_family = self.text.borrow_mut().register(&bytes)?;
        self.fonts.insert(
            family.into(),
            FontEntry {
                data: vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0),
                parley_family,
            },
        );
        Ok(())
    }

    /// Resolve a template family string, trying the full string first and
    /// then each comma-separated candidate, before falling back to the
    /// default font.
    fn resolve_font(&self, family: &str) -> &FontEntry {
        if let Some(entry) = self.fonts.get(family) {
            return entry;
        }
        for candidate in family.split(',') {
            if let Some(entry) = self.fonts.get(candidate.trim()) {
                return entry;
            }
        }
        &self.default_font
    }

    fn image_paint(&self, image: &PreparedImage) -> CardResult<vello_cpu::Image> {
        let key = Arc::as_ptr(&image.rgba8_premul) as usize;
        if let Some(paint) = self.image_cache.borrow().get(&key) {
            return Ok(paint.clone());
        }

        let pixmap =
            premul_bytes_to_pixmap(image.rgba8_premul.as_slice(), image.width, image.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.image_cache.borrow_mut().insert(key, paint.clone());
        Ok(paint)
    }
}

impl TextMeasure for RasterSurface {
    fn text_width(&self, font: &FontSpec, text: &str) -> f64 {
        if text.is_empty() || font.size <= 0.0 {
            return 0.0;
        }
        let family = self.resolve_font(&font.family).parley_family.clone();
        let layout =
            self.text
                .borrow_mut()
                .layout_line(text, &family, font, TextBrushRgba8::default());
        f64::from(layout.full_width())
    }
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.ctx = vello_cpu::RenderContext::new(self.width as u16, self.height as u16);
        for px in self.pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, 0]);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        self.ctx.fill_rect(&rect_to_cpu(rect));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Rgba8, line_width: f64) {
        // Four edge bands; vello's stroking machinery is overkill for the
        // axis-aligned hairlines the card layer needs.
        let w = line_width.max(0.0);
        let edges = [
            Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + w),
            Rect::new(rect.x0, rect.y1 - w, rect.x1, rect.y1),
            Rect::new(rect.x0, rect.y0, rect.x0 + w, rect.y1),
            Rect::new(rect.x1 - w, rect.y0, rect.x1, rect.y1),
        ];
        for edge in edges {
            self.fill_rect(edge, color);
        }
    }

    fn draw_image(
        &mut self,
        image: &PreparedImage,
        src: Rect,
        dst: Rect,
        clip: Option<&BezPath>,
    ) -> CardResult<()> {
        if src.width() <= 0.0 || src.height() <= 0.0 {
            return Err(CardError::draw("image blit needs a non-empty source rect"));
        }
        let paint = self.image_paint(image)?;

        if let Some(path) = clip {
            self.ctx
                .set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            self.ctx.push_clip_layer(&bezpath_to_cpu(path));
        }

        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        let transform = kurbo::Affine::translate((dst.x0, dst.y0))
            * kurbo::Affine::scale_non_uniform(sx, sy)
            * kurbo::Affine::translate((-src.x0, -src.y0));

        self.ctx.set_transform(affine_to_cpu(transform));
        self.ctx.set_paint(paint);
        self.ctx.fill_rect(&rect_to_cpu(src));

        if clip.is_some() {
            self.ctx.pop_layer();
        }
        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(())
    }

    fn fill_text(
        &mut self,
        text: &str,
        anchor_x: f64,
        baseline_y: f64,
        font: &FontSpec,
        align: Align,
        color: Rgba8,
    ) -> CardResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        if font.size <= 0.0 {
            return Err(CardError::draw("text fill needs fontSize > 0"));
        }

        let entry = self.resolve_font(&font.family).clone();
        let brush = TextBrushRgba8 {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        let layout = self
            .text
            .borrow_mut()
            .layout_line(text, &entry.parley_family, font, brush);

        let line_width = f64::from(layout.full_width());
        let x = match align {
            Align::Left => anchor_x,
            Align::Center => anchor_x - line_width / 2.0,
            Align::Right => anchor_x - line_width,
        };
        let Some(first_line) = layout.lines().next() else {
            return Ok(());
        };
        let y = baseline_y - f64::from(first_line.metrics().baseline);

        self.ctx
            .set_transform(affine_to_cpu(kurbo::Affine::translate((x, y))));

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let brush = run.style().brush;
                self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));

                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                self.ctx
                    .glyph_run(&entry.data)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }

        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(())
    }

    fn to_frame(&mut self) -> CardResult<FrameRgba> {
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        // Queued ops are now baked into the pixmap; start the next batch
        // clean so repeated readbacks never double-composite.
        self.ctx = vello_cpu::RenderContext::new(self.width as u16, self.height as u16);

        Ok(FrameRgba {
            width: self.width,
            height: self.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

fn affine_to_cpu(a: kurbo::Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> CardResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| CardError::draw("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| CardError::draw("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(CardError::draw("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premul_pixmap_rejects_bad_lengths() {
        assert!(premul_bytes_to_pixmap(&[0u8; 7], 1, 2).is_err());
        assert!(premul_bytes_to_pixmap(&[0u8; 8], 1, 2).is_ok());
    }

    #[test]
    fn bezpath_conversion_keeps_every_element() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.quad_to((10.0, 10.0), (0.0, 10.0));
        path.close_path();

        let cpu = bezpath_to_cpu(&path);
        assert_eq!(cpu.elements().len(), path.elements().len());
    }

    #[test]
    fn surface_rejects_degenerate_dimensions() {
        assert!(RasterSurface::new(0, 10, Vec::new()).is_err());
        assert!(RasterSurface::new(10, 70_000, Vec::new()).is_err());
    }
}
