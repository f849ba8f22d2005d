use std::collections::{BTreeMap, HashSet};

use crate::{
    color::Rgba8,
    error::{CardError, CardResult},
    shape::{Shape, ShapeKind, TrapezoidParams},
};

/// Priority assumed for content elements whose named layer is absent from
/// `content_layers` and that carry no explicit priority.
pub const DEFAULT_CONTENT_PRIORITY: i32 = 50;
/// Default priority for skill-item title layers.
pub const DEFAULT_TITLE_PRIORITY: i32 = 60;
/// A template without any base layer at or below this priority gets the
/// solid fallback background.
pub const BACKGROUND_PRIORITY_CEILING: i32 = 10;

/// A card template: fixed canvas, base image layers, editable regions.
///
/// Immutable once loaded. Field names mirror the external template document
/// (camelCase JSON). The one derived runtime value (per-item resolved
/// heights) lives in [`crate::layout::GroupLayouts`], never here.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Named semantic depth buckets (e.g. "background", "midground",
    /// "foreground") mapped to draw priorities.
    #[serde(default)]
    pub content_layers: BTreeMap<String, i32>,
    #[serde(default)]
    pub layers: Vec<BaseLayer>,
    #[serde(default)]
    pub text_areas: Vec<TextRegion>,
    #[serde(default)]
    pub image_areas: Vec<ImageRegion>,
    #[serde(default)]
    pub vertical_groups: Vec<VerticalGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bleed_background: Option<BleedBackground>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseLayer {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Draw size; a missing value means the image's natural size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub z_index: i32,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRegion {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub has_background: bool,
    #[serde(default)]
    pub lock_position: LockPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<Rgba8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<FontStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Rgba8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegion {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub shape: ShapeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trapezoid_params: Option<TrapezoidParams>,
    #[serde(default)]
    pub layer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl ImageRegion {
    /// The region's clip shape with its parameters resolved.
    pub fn clip_shape(&self) -> Shape {
        match self.shape {
            ShapeKind::Rectangle => Shape::Rectangle,
            ShapeKind::Circle => Shape::Circle,
            ShapeKind::Diamond => Shape::Diamond,
            ShapeKind::Trapezoid => Shape::Trapezoid {
                top_width: self.trapezoid_params.as_ref().and_then(|p| p.top_width),
            },
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerticalGroup {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: f64,
    #[serde(default = "default_group_spacing")]
    pub spacing: f64,
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub items: Vec<SkillItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_title_width")]
    pub title_width: f64,
    #[serde(default)]
    pub content_placeholder: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_title_font_size")]
    pub title_font_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_font_weight: Option<FontWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<FontStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<Rgba8>,
    #[serde(default)]
    pub has_background: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Rgba8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_layer: Option<TitleLayer>,
    #[serde(default)]
    pub padding: Padding,
}

/// Decorative header of a skill item, drawn at a fixed height independent of
/// the item's body content.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleLayer {
    /// Overrides the item's `title` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<Rgba8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Rgba8>,
    #[serde(default = "default_title_priority")]
    pub z_index: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Padding {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub left: f64,
}

impl Padding {
    pub const fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPosition {
    #[default]
    Top,
    Bottom,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Background drawn under the bleed margin on export.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BleedBackground {
    pub url: String,
    #[serde(default)]
    pub fill_mode: FillMode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Stretch to fill the whole bleed-inclusive area.
    Cover,
    /// Tile at natural size.
    Repeat,
    /// Scale preserving aspect ratio, centered.
    #[default]
    Contain,
}

fn default_font_size() -> f64 {
    16.0
}

fn default_title_font_size() -> f64 {
    18.0
}

fn default_title_width() -> f64 {
    100.0
}

fn default_group_spacing() -> f64 {
    15.0
}

fn default_title_priority() -> i32 {
    DEFAULT_TITLE_PRIORITY
}

impl Template {
    /// Resolved draw priority for a content element: its own explicit value
    /// if present, else the named content layer's, else
    /// [`DEFAULT_CONTENT_PRIORITY`].
    pub fn content_priority(&self, explicit: Option<i32>, layer: &str) -> i32 {
        explicit
            .or_else(|| self.content_layers.get(layer).copied())
            .unwrap_or(DEFAULT_CONTENT_PRIORITY)
    }

    pub fn validate(&self) -> CardResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CardError::validation("template width/height must be > 0"));
        }

        let mut seen = HashSet::new();
        let mut unique = |id: &str| -> CardResult<()> {
            if !seen.insert(id.to_string()) {
                return Err(CardError::validation(format!(
                    "region/item id '{id}' is not unique within the template"
                )));
            }
            Ok(())
        };

        for area in &self.text_areas {
            unique(&area.id)?;
            if area.width <= 0.0 {
                return Err(CardError::validation(format!(
                    "text area '{}' must have width > 0",
                    area.id
                )));
            }
            if area.font_size <= 0.0 {
                return Err(CardError::validation(format!(
                    "text area '{}' must have fontSize > 0",
                    area.id
                )));
            }
        }

        for area in &self.image_areas {
            unique(&area.id)?;
            if area.width <= 0.0 || area.height <= 0.0 {
                return Err(CardError::validation(format!(
                    "image area '{}' must have width/height > 0",
                    area.id
                )));
            }
        }

        for group in &self.vertical_groups {
            if group.width <= 0.0 {
                return Err(CardError::validation(format!(
                    "vertical group '{}' must have width > 0",
                    group.id
                )));
            }
            for item in &group.items {
                unique(&item.id)?;
                if item.font_size <= 0.0 || item.title_font_size <= 0.0 {
                    return Err(CardError::validation(format!(
                        "skill item '{}' must have positive font sizes",
                        item.id
                    )));
                }
            }
        }

        Ok(())
    }
}
