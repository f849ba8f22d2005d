use std::collections::HashMap;

use crate::{
    content::UserContent,
    model::{
        FontStyle, FontWeight, LockPosition, Padding, SkillItem, Template, TextRegion,
        VerticalGroup,
    },
};

/// Fixed line-height ratio applied to every wrapped text block.
pub const LINE_HEIGHT_RATIO: f64 = 1.2;
/// Title blocks are sized from the title font alone, never from body text.
pub const TITLE_HEIGHT_RATIO: f64 = 1.8;
/// Fraction of the font size added when a bottom-locked block shifts down.
pub const BOTTOM_LOCK_NUDGE: f64 = 0.2;

pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// Font descriptor handed to the drawing surface for measurement and fills.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
    pub weight: FontWeight,
    pub style: FontStyle,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size: f64) -> Self {
        Self {
            family: family.into(),
            size,
            weight: FontWeight::Normal,
            style: FontStyle::Normal,
        }
    }

    pub fn for_text_region(region: &TextRegion) -> Self {
        Self {
            family: region
                .font_family
                .clone()
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            size: region.font_size,
            weight: region.font_weight.unwrap_or_default(),
            style: region.font_style.unwrap_or_default(),
        }
    }

    pub fn for_item_body(item: &SkillItem) -> Self {
        Self {
            family: item
                .font_family
                .clone()
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            size: item.font_size,
            weight: item.font_weight.unwrap_or_default(),
            style: item.font_style.unwrap_or_default(),
        }
    }

    /// Title font: the title layer's overrides win, then the item's title
    /// settings; titles default to bold.
    pub fn for_item_title(item: &SkillItem) -> Self {
        let layer = item.title_layer.as_ref();
        Self {
            family: layer
                .and_then(|l| l.font_family.clone())
                .or_else(|| item.font_family.clone())
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            size: layer
                .and_then(|l| l.font_size)
                .unwrap_or(item.title_font_size),
            weight: layer
                .and_then(|l| l.font_weight)
                .or(item.title_font_weight)
                .unwrap_or(FontWeight::Bold),
            style: FontStyle::Normal,
        }
    }
}

/// Text measurement capability. The raster surface implements this with real
/// shaping; layout code never measures pixels itself.
pub trait TextMeasure {
    /// Rendered advance width of `text` in `font`, in pixels.
    fn text_width(&self, font: &FontSpec, text: &str) -> f64;
}

pub fn line_height(font_size: f64) -> f64 {
    font_size * LINE_HEIGHT_RATIO
}

/// Greedy word wrap. Explicit line breaks split first (empty lines are
/// preserved); within a paragraph, words pack until the next word would
/// exceed `max_width`. A single word wider than the box still gets its own
/// line, never a mid-word split.
pub fn wrap_text(
    measure: &dyn TextMeasure,
    font: &FontSpec,
    text: &str,
    max_width: f64,
) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = Vec::new();

    for paragraph in normalized.split('\n') {
        let mut words = paragraph.split(' ').filter(|w| !w.is_empty());
        let Some(first) = words.next() else {
            lines.push(String::new());
            continue;
        };

        let mut line = first.to_string();
        for word in words {
            let candidate = format!("{line} {word}");
            if measure.text_width(font, &candidate) > max_width {
                lines.push(std::mem::replace(&mut line, word.to_string()));
            } else {
                line = candidate;
            }
        }
        lines.push(line);
    }

    lines
}

/// Height the text needs at `max_width`, or 0 for empty text / empty box.
pub fn wrapped_height(
    measure: &dyn TextMeasure,
    font: &FontSpec,
    text: &str,
    max_width: f64,
) -> f64 {
    if text.is_empty() || max_width <= 0.0 {
        return 0.0;
    }
    wrap_text(measure, font, text, max_width).len() as f64 * line_height(font.size)
}

/// Line budget and resulting height of a text block, after the optional
/// max-height clamp. Overflowing lines are dropped, not ellipsized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextBlockMetrics {
    pub lines_drawn: usize,
    pub height: f64,
}

pub fn block_metrics(line_count: usize, font_size: f64, max_height: Option<f64>) -> TextBlockMetrics {
    let lh = line_height(font_size);
    match max_height {
        Some(max) if max > 0.0 => {
            let lines_drawn = (max / lh).floor() as usize;
            TextBlockMetrics {
                lines_drawn,
                height: (lines_drawn as f64 * lh).min(max),
            }
        }
        _ => TextBlockMetrics {
            lines_drawn: line_count,
            height: line_count as f64 * lh,
        },
    }
}

/// Baseline of the first drawn line. A bottom-locked block whose content is
/// shorter than its box hugs the box bottom instead of the top.
pub fn first_baseline(
    y: f64,
    font_size: f64,
    actual_height: f64,
    max_height: Option<f64>,
    lock: LockPosition,
) -> f64 {
    if lock == LockPosition::Bottom
        && let Some(max) = max_height
        && max > 0.0
        && actual_height < max
    {
        return y + max - actual_height + font_size * BOTTOM_LOCK_NUDGE;
    }
    y + font_size
}

/// Title block height, fixed by the title font and padding alone.
pub fn fixed_title_height(title_font_size: f64, padding: Padding) -> f64 {
    title_font_size * TITLE_HEIGHT_RATIO + padding.top + padding.bottom
}

/// Width left for an item's body column beside its title column.
pub fn content_column_width(group_width: f64, title_width: f64, padding: Padding) -> f64 {
    group_width - title_width - padding.left - padding.right
}

/// Body text for an item: entered text, else the item's placeholder.
pub fn resolve_item_content<'a>(content: &'a UserContent, item: &'a SkillItem) -> &'a str {
    let text = content.text_for(&item.id);
    if text.is_empty() {
        &item.content_placeholder
    } else {
        text
    }
}

/// Resolved geometry of one skill item within its group.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemLayout {
    /// Item top edge on the canvas.
    pub y: f64,
    /// `max(content height + vertical padding, fixed title height)`.
    pub height: f64,
    pub content_height: f64,
    pub content_width: f64,
    pub title_height: f64,
}

fn measure_item(
    measure: &dyn TextMeasure,
    item: &SkillItem,
    group_width: f64,
    content: &UserContent,
) -> ItemLayout {
    let body = resolve_item_content(content, item);
    let font = FontSpec::for_item_body(item);
    let content_width = content_column_width(group_width, item.title_width, item.padding);
    let content_height = wrapped_height(measure, &font, body, content_width);
    let title_height = fixed_title_height(item.title_font_size, item.padding);
    let height = (content_height + item.padding.top + item.padding.bottom).max(title_height);
    ItemLayout {
        y: 0.0,
        height,
        content_height,
        content_width,
        title_height,
    }
}

/// Stack a group's items top to bottom: the first item sits at the group
/// origin, each next one below the previous item plus the group spacing.
/// One accumulation pass; nothing reflows afterwards.
pub fn layout_group(
    measure: &dyn TextMeasure,
    group: &VerticalGroup,
    content: &UserContent,
) -> Vec<(String, ItemLayout)> {
    let mut out = Vec::with_capacity(group.items.len());
    let mut y = group.y;
    for item in &group.items {
        let mut layout = measure_item(measure, item, group.width, content);
        layout.y = y;
        y += layout.height + group.spacing;
        out.push((item.id.clone(), layout));
    }
    out
}

/// Render-scoped map of resolved item layouts, rebuilt at the start of every
/// pass. This replaces any notion of caching derived heights on the template
/// itself; the template stays immutable.
#[derive(Clone, Debug, Default)]
pub struct GroupLayouts {
    items: HashMap<String, ItemLayout>,
}

impl GroupLayouts {
    pub fn compute(measure: &dyn TextMeasure, template: &Template, content: &UserContent) -> Self {
        let mut items = HashMap::new();
        for group in &template.vertical_groups {
            for (id, layout) in layout_group(measure, group, content) {
                items.insert(id, layout);
            }
        }
        Self { items }
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemLayout> {
        self.items.get(item_id)
    }
}
