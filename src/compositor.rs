use std::collections::HashMap;

use kurbo::{Rect, Shape as _};

use crate::{
    assets::{PreparedImage, loader::LoadedLayer},
    color::Rgba8,
    content::{ImageTransform, UserContent},
    error::{CardError, CardResult},
    layout::{
        DEFAULT_FONT_FAMILY, FontSpec, GroupLayouts, TextBlockMetrics, block_metrics,
        first_baseline, line_height, resolve_item_content, wrap_text,
    },
    model::{
        Align, BACKGROUND_PRIORITY_CEILING, ImageRegion, LockPosition, SkillItem, Template,
        TextRegion, VerticalGroup,
    },
    surface::Surface,
};

/// Padding around a text region's background panel, in pixels.
const TEXT_PANEL_PADDING: f64 = 5.0;

/// Colors used for everything a template does not specify itself.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Fill used when a template has no background art.
    pub fallback_color: Rgba8,
    pub fallback_border_color: Rgba8,
    /// Default text panel fill and border.
    pub text_bg_color: Rgba8,
    pub text_border_color: Rgba8,
    /// Default title-layer fill when it has no image and no color.
    pub title_bg_color: Rgba8,
    pub diagnostic_bg_color: Rgba8,
    pub diagnostic_text_color: Rgba8,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fallback_color: Rgba8::WHITE,
            fallback_border_color: Rgba8::opaque(0xdd, 0xdd, 0xdd),
            text_bg_color: Rgba8::new(255, 255, 255, 204),
            text_border_color: Rgba8::new(0, 0, 0, 26),
            title_bg_color: Rgba8::new(200, 200, 200, 204),
            diagnostic_bg_color: Rgba8::opaque(0xff, 0xeb, 0xee),
            diagnostic_text_color: Rgba8::opaque(0xb7, 0x1c, 0x1c),
        }
    }
}

/// Everything one render pass reads. Constructed by the caller and passed by
/// reference; the engine keeps no ambient state between passes.
pub struct RenderContext<'a> {
    pub template: &'a Template,
    pub layers: &'a [LoadedLayer],
    /// Item id → decoded title background, for items whose title layer named
    /// one and whose load succeeded.
    pub title_backgrounds: &'a HashMap<String, PreparedImage>,
    pub content: &'a UserContent,
    pub settings: &'a RenderSettings,
}

/// Outcome of a render pass. A pass never fails outright: collection
/// failures produce a diagnostic frame, per-element failures skip that
/// element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderReport {
    pub elements_drawn: usize,
    pub elements_skipped: usize,
    pub diagnostic: Option<String>,
}

enum ElementKind<'a> {
    Base(&'a LoadedLayer),
    Title {
        group: &'a VerticalGroup,
        item: &'a SkillItem,
    },
    Text(&'a TextRegion),
    Body(&'a VerticalGroup),
    Image {
        region: &'a ImageRegion,
        image: &'a PreparedImage,
        transform: ImageTransform,
    },
}

impl ElementKind<'_> {
    fn describe(&self) -> String {
        match self {
            ElementKind::Base(l) => format!("base layer '{}'", l.layer.id),
            ElementKind::Title { item, .. } => format!("title layer of '{}'", item.id),
            ElementKind::Text(r) => format!("text region '{}'", r.id),
            ElementKind::Body(g) => format!("vertical group '{}'", g.id),
            ElementKind::Image { region, .. } => format!("image region '{}'", region.id),
        }
    }
}

struct Element<'a> {
    priority: i32,
    kind: ElementKind<'a>,
}

/// Run one full render pass against the surface.
///
/// The frame is cleared, group layouts are resolved, all drawable elements
/// are collected and stably sorted by resolved priority, then drawn in
/// order. Failures never propagate: a broken template yields a diagnostic
/// frame, a broken element is logged and skipped.
pub fn render_card(surface: &mut dyn Surface, ctx: &RenderContext<'_>) -> RenderReport {
    surface.clear();

    let (layouts, elements) = match prepare(&*surface, ctx) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(template = %ctx.template.id, error = %e,
                "render pass failed, showing diagnostic frame");
            draw_diagnostic(surface, ctx.settings, &e);
            return RenderReport {
                diagnostic: Some(e.to_string()),
                ..RenderReport::default()
            };
        }
    };

    ensure_background(surface, ctx);

    let mut report = RenderReport::default();
    for element in &elements {
        match draw_element(surface, ctx, &layouts, element) {
            Ok(()) => report.elements_drawn += 1,
            Err(e) => {
                tracing::warn!(element = %element.kind.describe(), error = %e,
                    "element failed to draw, skipping");
                report.elements_skipped += 1;
            }
        }
    }
    report
}

fn prepare<'a>(
    surface: &dyn Surface,
    ctx: &RenderContext<'a>,
) -> CardResult<(GroupLayouts, Vec<Element<'a>>)> {
    ctx.template.validate()?;
    if surface.width() != ctx.template.width || surface.height() != ctx.template.height {
        return Err(CardError::layout(format!(
            "surface is {}x{} but template '{}' needs {}x{}",
            surface.width(),
            surface.height(),
            ctx.template.id,
            ctx.template.width,
            ctx.template.height
        )));
    }

    let measure: &dyn crate::layout::TextMeasure = surface;
    let layouts = GroupLayouts::compute(measure, ctx.template, ctx.content);
    Ok((layouts, collect_elements(ctx)))
}

fn collect_elements<'a>(ctx: &RenderContext<'a>) -> Vec<Element<'a>> {
    let t = ctx.template;
    let mut elements = Vec::new();

    for loaded in ctx.layers {
        elements.push(Element {
            priority: loaded.layer.z_index,
            kind: ElementKind::Base(loaded),
        });
    }

    for group in &t.vertical_groups {
        for item in &group.items {
            if let Some(title) = &item.title_layer {
                elements.push(Element {
                    priority: title.z_index,
                    kind: ElementKind::Title { group, item },
                });
            }
        }
    }

    for area in &t.text_areas {
        elements.push(Element {
            priority: t.content_priority(area.z_index, &area.layer),
            kind: ElementKind::Text(area),
        });
    }

    for group in &t.vertical_groups {
        elements.push(Element {
            priority: t.content_priority(group.z_index, &group.layer),
            kind: ElementKind::Body(group),
        });
    }

    // Regions without uploaded content are skipped entirely; an empty text
    // string above still draws.
    for area in &t.image_areas {
        if let Some(image) = ctx.content.image_for(&area.id) {
            elements.push(Element {
                priority: t.content_priority(area.z_index, &area.layer),
                kind: ElementKind::Image {
                    region: area,
                    image,
                    transform: ctx.content.transform_for(&area.id),
                },
            });
        }
    }

    // Stable: equal priorities keep the collection order above.
    elements.sort_by_key(|e| e.priority);
    elements
}

fn ensure_background(surface: &mut dyn Surface, ctx: &RenderContext<'_>) {
    let has_background = ctx
        .layers
        .iter()
        .any(|l| l.layer.z_index <= BACKGROUND_PRIORITY_CEILING);
    if has_background {
        return;
    }

    let full = Rect::new(0.0, 0.0, surface.width() as f64, surface.height() as f64);
    surface.fill_rect(full, ctx.settings.fallback_color);
    surface.stroke_rect(full, ctx.settings.fallback_border_color, 1.0);
}

fn draw_element(
    surface: &mut dyn Surface,
    ctx: &RenderContext<'_>,
    layouts: &GroupLayouts,
    element: &Element<'_>,
) -> CardResult<()> {
    match &element.kind {
        ElementKind::Base(loaded) => draw_base_layer(surface, loaded),
        ElementKind::Title { group, item } => draw_group_title(surface, ctx, layouts, group, item),
        ElementKind::Text(region) => draw_text_region(surface, ctx, region),
        ElementKind::Body(group) => draw_group_body(surface, ctx, layouts, group),
        ElementKind::Image {
            region,
            image,
            transform,
        } => draw_image_region(surface, region, image, *transform),
    }
}

fn draw_base_layer(surface: &mut dyn Surface, loaded: &LoadedLayer) -> CardResult<()> {
    let (iw, ih) = (loaded.image.width as f64, loaded.image.height as f64);
    let w = loaded.layer.width.unwrap_or(iw);
    let h = loaded.layer.height.unwrap_or(ih);
    surface.draw_image(
        &loaded.image,
        Rect::new(0.0, 0.0, iw, ih),
        Rect::new(loaded.layer.x, loaded.layer.y, loaded.layer.x + w, loaded.layer.y + h),
        None,
    )
}

fn draw_text_region(
    surface: &mut dyn Surface,
    ctx: &RenderContext<'_>,
    region: &TextRegion,
) -> CardResult<()> {
    let text = ctx.content.text_for(&region.id);
    let panel = region.has_background.then(|| PanelStyle {
        fill: region.bg_color.unwrap_or(ctx.settings.text_bg_color),
        border: ctx.settings.text_border_color,
    });
    draw_text_block(
        surface,
        text,
        &TextBlock {
            x: region.x,
            y: region.y,
            width: region.width,
            max_height: (region.height > 0.0).then_some(region.height),
            font: FontSpec::for_text_region(region),
            align: region.align,
            lock: region.lock_position,
            color: region.text_color.unwrap_or(Rgba8::BLACK),
            panel,
        },
    )?;
    Ok(())
}

fn draw_group_body(
    surface: &mut dyn Surface,
    ctx: &RenderContext<'_>,
    layouts: &GroupLayouts,
    group: &VerticalGroup,
) -> CardResult<()> {
    for item in &group.items {
        let Some(layout) = layouts.get(&item.id) else {
            continue;
        };
        let pad = item.padding;

        if item.has_background {
            let rect = Rect::new(
                group.x + pad.left,
                layout.y + pad.top,
                group.x + group.width - pad.right,
                layout.y + layout.height - pad.bottom,
            );
            surface.fill_rect(rect, item.bg_color.unwrap_or(ctx.settings.text_bg_color));
            surface.stroke_rect(rect, ctx.settings.text_border_color, 1.0);
        }

        let body = resolve_item_content(ctx.content, item);
        draw_text_block(
            surface,
            body,
            &TextBlock {
                x: group.x + item.title_width + pad.left,
                y: layout.y + pad.top,
                width: layout.content_width,
                max_height: (layout.content_height > 0.0).then_some(layout.content_height),
                font: FontSpec::for_item_body(item),
                align: Align::Left,
                lock: LockPosition::Top,
                color: item.text_color.unwrap_or(Rgba8::BLACK),
                panel: None,
            },
        )?;
    }
    Ok(())
}

fn draw_group_title(
    surface: &mut dyn Surface,
    ctx: &RenderContext<'_>,
    layouts: &GroupLayouts,
    group: &VerticalGroup,
    item: &SkillItem,
) -> CardResult<()> {
    let Some(title) = &item.title_layer else {
        return Ok(());
    };
    let Some(layout) = layouts.get(&item.id) else {
        return Ok(());
    };

    let pad = item.padding;
    let title_box = Rect::new(
        group.x + pad.left,
        layout.y + pad.top,
        group.x + item.title_width - pad.right,
        layout.y + layout.title_height - pad.bottom,
    );

    if let Some(bg) = ctx.title_backgrounds.get(&item.id) {
        draw_image_cover(surface, bg, title_box)?;
    } else {
        surface.fill_rect(title_box, title.bg_color.unwrap_or(ctx.settings.title_bg_color));
    }

    let text = title.text.as_deref().unwrap_or(&item.title);
    if !text.is_empty() {
        let font = FontSpec::for_item_title(item);
        // Optically center on the box: baseline sits a third of the font
        // size below the vertical midpoint.
        let baseline = title_box.center().y + font.size / 3.0;
        surface.fill_text(
            text,
            title_box.center().x,
            baseline,
            &font,
            Align::Center,
            title.text_color.unwrap_or(Rgba8::BLACK),
        )?;
    }
    Ok(())
}

/// Aspect-preserving cover blit: the image is scaled to cover `rect`,
/// centered, and clipped to it.
fn draw_image_cover(
    surface: &mut dyn Surface,
    image: &PreparedImage,
    rect: Rect,
) -> CardResult<()> {
    let (iw, ih) = (image.width as f64, image.height as f64);
    if iw <= 0.0 || ih <= 0.0 || rect.width() <= 0.0 || rect.height() <= 0.0 {
        return Ok(());
    }

    let scale = (rect.width() / iw).max(rect.height() / ih);
    let (dw, dh) = (iw * scale, ih * scale);
    let dst = Rect::new(
        rect.center().x - dw / 2.0,
        rect.center().y - dh / 2.0,
        rect.center().x + dw / 2.0,
        rect.center().y + dh / 2.0,
    );
    let clip = rect.to_path(0.1);
    surface.draw_image(image, Rect::new(0.0, 0.0, iw, ih), dst, Some(&clip))
}

fn draw_image_region(
    surface: &mut dyn Surface,
    region: &ImageRegion,
    image: &PreparedImage,
    transform: ImageTransform,
) -> CardResult<()> {
    let (iw, ih) = (image.width as f64, image.height as f64);
    let scaled_w = iw * transform.scale;
    let scaled_h = ih * transform.scale;

    let origin_x = region.x - transform.x;
    let origin_y = region.y - transform.y;
    let dst = Rect::new(origin_x, origin_y, origin_x + scaled_w, origin_y + scaled_h);

    let region_box = Rect::new(
        region.x,
        region.y,
        region.x + region.width,
        region.y + region.height,
    );
    let clip = region.clip_shape().clip_path(region_box);
    surface.draw_image(image, Rect::new(0.0, 0.0, iw, ih), dst, Some(&clip))
}

struct PanelStyle {
    fill: Rgba8,
    border: Rgba8,
}

struct TextBlock {
    x: f64,
    y: f64,
    width: f64,
    max_height: Option<f64>,
    font: FontSpec,
    align: Align,
    lock: LockPosition,
    color: Rgba8,
    panel: Option<PanelStyle>,
}

/// Wrap, clamp and draw one block of text, with its optional background
/// panel. Returns the block metrics actually used.
fn draw_text_block(
    surface: &mut dyn Surface,
    text: &str,
    block: &TextBlock,
) -> CardResult<TextBlockMetrics> {
    if block.width <= 0.0 {
        return Ok(TextBlockMetrics {
            lines_drawn: 0,
            height: 0.0,
        });
    }

    let measure: &dyn crate::layout::TextMeasure = &*surface;
    let lines = wrap_text(measure, &block.font, text, block.width);
    let metrics = block_metrics(lines.len(), block.font.size, block.max_height);
    let baseline0 = first_baseline(
        block.y,
        block.font.size,
        metrics.height,
        block.max_height,
        block.lock,
    );

    if let Some(panel) = &block.panel {
        let top = baseline0 - block.font.size;
        let rect = Rect::new(
            block.x - TEXT_PANEL_PADDING,
            top - TEXT_PANEL_PADDING,
            block.x + block.width + TEXT_PANEL_PADDING,
            top + metrics.height + TEXT_PANEL_PADDING,
        );
        surface.fill_rect(rect, panel.fill);
        surface.stroke_rect(rect, panel.border, 1.0);
    }

    let anchor_x = match block.align {
        Align::Left => block.x,
        Align::Center => block.x + block.width / 2.0,
        Align::Right => block.x + block.width,
    };

    let lh = line_height(block.font.size);
    for (i, line) in lines.iter().take(metrics.lines_drawn).enumerate() {
        if line.is_empty() {
            continue;
        }
        surface.fill_text(
            line,
            anchor_x,
            baseline0 + i as f64 * lh,
            &block.font,
            block.align,
            block.color,
        )?;
    }

    Ok(metrics)
}

/// Replace the frame with a visible failure placeholder. Best effort: if
/// even the placeholder text cannot draw, the tinted frame still shows.
fn draw_diagnostic(surface: &mut dyn Surface, settings: &RenderSettings, error: &CardError) {
    let (w, h) = (surface.width() as f64, surface.height() as f64);
    surface.fill_rect(Rect::new(0.0, 0.0, w, h), settings.diagnostic_bg_color);

    let mut message: String = error.to_string().chars().take(50).collect();
    if message.len() < error.to_string().len() {
        message.push_str("...");
    }

    let title_font = FontSpec::new(DEFAULT_FONT_FAMILY, 16.0);
    let detail_font = FontSpec::new(DEFAULT_FONT_FAMILY, 12.0);
    for (text, font, y) in [
        ("Render failed", &title_font, h / 2.0 - 20.0),
        (message.as_str(), &detail_font, h / 2.0 + 10.0),
    ] {
        if let Err(e) = surface.fill_text(
            text,
            w / 2.0,
            y,
            font,
            Align::Center,
            settings.diagnostic_text_color,
        ) {
            tracing::warn!(error = %e, "diagnostic text failed to draw");
        }
    }
}
