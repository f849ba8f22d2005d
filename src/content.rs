use std::collections::{BTreeMap, HashMap};

use crate::assets::PreparedImage;

/// Pixel offsets and scale applied to an uploaded image inside its region.
/// Offsets are against the image's scaled natural size, not the region box.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageTransform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl ImageTransform {
    /// Initial placement centering the scaled image over the region box.
    pub fn centered(image_w: f64, image_h: f64, box_w: f64, box_h: f64, scale: f64) -> Self {
        Self {
            x: (image_w * scale - box_w) / 2.0,
            y: (image_h * scale - box_h) / 2.0,
            scale,
        }
    }
}

/// Per-render user content, owned by the caller and supplied to each pass.
#[derive(Clone, Debug, Default)]
pub struct UserContent {
    /// Region/item id → entered text.
    pub text: HashMap<String, String>,
    /// Image region id → decoded upload.
    pub images: HashMap<String, PreparedImage>,
    /// Image region id → placement transform.
    pub transforms: HashMap<String, ImageTransform>,
}

impl UserContent {
    pub fn text_for(&self, id: &str) -> &str {
        self.text.get(id).map(String::as_str).unwrap_or("")
    }

    pub fn image_for(&self, id: &str) -> Option<&PreparedImage> {
        self.images.get(id)
    }

    pub fn transform_for(&self, id: &str) -> ImageTransform {
        self.transforms.get(id).copied().unwrap_or_default()
    }
}

/// Serializable user-content document: like [`UserContent`] but with image
/// sources as fetchable references instead of decoded pixels.
/// `assets::loader::resolve_content` turns it into a [`UserContent`].
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentDoc {
    pub text_content: BTreeMap<String, String>,
    pub image_content: BTreeMap<String, String>,
    pub image_transforms: BTreeMap<String, ImageTransform>,
}
