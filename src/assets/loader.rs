use std::{collections::HashMap, path::PathBuf};

use rayon::prelude::*;

use crate::{
    assets::{PreparedImage, decode::decode_image},
    content::{ContentDoc, ImageTransform, UserContent},
    error::{CardError, CardResult},
    model::{BaseLayer, Template},
};

/// Source of raw asset bytes. Implementations may hit the filesystem, an
/// archive, or an in-memory table; the engine itself never does IO.
pub trait AssetFetcher: Sync {
    fn fetch(&self, source: &str) -> CardResult<Vec<u8>>;
}

/// Filesystem fetcher rooted at a directory. Sources are normalized
/// template-relative paths; absolute paths and parent traversal are
/// rejected.
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetFetcher for FsFetcher {
    fn fetch(&self, source: &str) -> CardResult<Vec<u8>> {
        let rel = normalize_rel_path(source)?;
        let path = self.root.join(rel);
        std::fs::read(&path)
            .map_err(|e| CardError::asset(format!("read '{}': {e}", path.display())))
    }
}

/// Normalize and validate template-relative asset paths.
///
/// The normalized result uses `/` separators, removes `.` segments and a
/// leading `/`, and rejects parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> CardResult<String> {
    let s = source.replace('\\', "/");
    if s.is_empty() {
        return Err(CardError::asset("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(CardError::asset("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(CardError::asset("asset path must contain a file name"));
    }

    Ok(out.join("/"))
}

/// A base layer whose image settled successfully.
#[derive(Clone, Debug)]
pub struct LoadedLayer {
    pub layer: BaseLayer,
    pub image: PreparedImage,
}

/// Fetch and decode every base layer of a template. All loads are issued as
/// one batch and the result is produced only after every item has settled;
/// a failed item is logged and skipped, it never fails the batch.
pub fn load_base_layers(fetcher: &dyn AssetFetcher, layers: &[BaseLayer]) -> Vec<LoadedLayer> {
    layers
        .par_iter()
        .map(|layer| {
            fetcher
                .fetch(&layer.url)
                .and_then(|bytes| decode_image(&bytes))
                .map(|image| LoadedLayer {
                    layer: layer.clone(),
                    image,
                })
                .map_err(|e| {
                    tracing::warn!(layer = %layer.id, url = %layer.url, error = %e,
                        "base layer failed to load, skipping");
                })
                .ok()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Fetch the title background image of every skill item that names one.
/// Per-item failures degrade to the title's background color.
pub fn load_title_backgrounds(
    fetcher: &dyn AssetFetcher,
    template: &Template,
) -> HashMap<String, PreparedImage> {
    let sources: Vec<(String, String)> = template
        .vertical_groups
        .iter()
        .flat_map(|g| g.items.iter())
        .filter_map(|item| {
            let url = item.title_layer.as_ref()?.bg_url.clone()?;
            Some((item.id.clone(), url))
        })
        .collect();

    sources
        .par_iter()
        .map(|(id, url)| {
            fetcher
                .fetch(url)
                .and_then(|bytes| decode_image(&bytes))
                .map(|image| (id.clone(), image))
                .map_err(|e| {
                    tracing::warn!(item = %id, url = %url, error = %e,
                        "title background failed to load, using fallback color");
                })
                .ok()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Fetch the template's bleed background, if any. A failed load degrades to
/// the flat export fallback color.
pub fn load_bleed_background(
    fetcher: &dyn AssetFetcher,
    template: &Template,
) -> Option<PreparedImage> {
    let bg = template.bleed_background.as_ref()?;
    match fetcher.fetch(&bg.url).and_then(|bytes| decode_image(&bytes)) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!(url = %bg.url, error = %e,
                "bleed background failed to load, using fallback color");
            None
        }
    }
}

/// Resolve a serialized content document into render-ready user content:
/// image references are fetched and decoded, and images without an explicit
/// transform start centered over their region, the way a fresh upload does.
pub fn resolve_content(
    fetcher: &dyn AssetFetcher,
    doc: &ContentDoc,
    template: &Template,
) -> UserContent {
    let mut content = UserContent {
        text: doc.text_content.clone().into_iter().collect(),
        images: HashMap::new(),
        transforms: doc.image_transforms.clone().into_iter().collect(),
    };

    let decoded: Vec<(String, PreparedImage)> = doc
        .image_content
        .par_iter()
        .map(|(id, source)| {
            fetcher
                .fetch(source)
                .and_then(|bytes| decode_image(&bytes))
                .map(|image| (id.clone(), image))
                .map_err(|e| {
                    tracing::warn!(region = %id, source = %source, error = %e,
                        "uploaded image failed to load, leaving region empty");
                })
                .ok()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    for (id, image) in decoded {
        if !content.transforms.contains_key(&id)
            && let Some(region) = template.image_areas.iter().find(|a| a.id == id)
        {
            content.transforms.insert(
                id.clone(),
                ImageTransform::centered(
                    image.width as f64,
                    image.height as f64,
                    region.width,
                    region.height,
                    1.0,
                ),
            );
        }
        content.images.insert(id, image);
    }

    content
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    struct MemFetcher {
        files: BTreeMap<String, Vec<u8>>,
    }

    impl AssetFetcher for MemFetcher {
        fn fetch(&self, source: &str) -> CardResult<Vec<u8>> {
            self.files
                .get(&normalize_rel_path(source)?)
                .cloned()
                .ok_or_else(|| CardError::asset(format!("no such asset '{source}'")))
        }
    }

    fn tiny_png() -> Vec<u8> {
        crate::assets::decode::tests::png_bytes(vec![10, 20, 30, 255], 1, 1)
    }

    fn layer(id: &str, url: &str, z: i32) -> BaseLayer {
        BaseLayer {
            id: id.to_string(),
            url: url.to_string(),
            x: 0.0,
            y: 0.0,
            width: None,
            height: None,
            z_index: z,
        }
    }

    #[test]
    fn normalize_rejects_traversal_and_keeps_clean_paths() {
        assert_eq!(normalize_rel_path("a/b.png").unwrap(), "a/b.png");
        assert_eq!(normalize_rel_path("/assets/./x.png").unwrap(), "assets/x.png");
        assert!(normalize_rel_path("../x.png").is_err());
        assert!(normalize_rel_path("").is_err());
        assert!(normalize_rel_path("/").is_err());
    }

    #[test]
    fn batch_load_keeps_successes_and_skips_failures() {
        let fetcher = MemFetcher {
            files: BTreeMap::from([("ok.png".to_string(), tiny_png())]),
        };
        let layers = vec![
            layer("a", "ok.png", 5),
            layer("b", "missing.png", 50),
            layer("c", "ok.png", 100),
        ];

        let loaded = load_base_layers(&fetcher, &layers);
        let ids: Vec<&str> = loaded.iter().map(|l| l.layer.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(loaded[0].image.width, 1);
    }

    #[test]
    fn resolved_content_centers_fresh_images() {
        let fetcher = MemFetcher {
            files: BTreeMap::from([("art.png".to_string(), tiny_png())]),
        };
        let template: Template = serde_json::from_value(serde_json::json!({
            "id": "t", "name": "t", "width": 600, "height": 800,
            "imageAreas": [
                { "id": "main", "x": 100, "y": 160, "width": 401, "height": 401 }
            ]
        }))
        .unwrap();
        let doc = ContentDoc {
            text_content: BTreeMap::from([("title".to_string(), "Hello".to_string())]),
            image_content: BTreeMap::from([
                ("main".to_string(), "art.png".to_string()),
                ("gone".to_string(), "missing.png".to_string()),
            ]),
            image_transforms: BTreeMap::new(),
        };

        let content = resolve_content(&fetcher, &doc, &template);
        assert_eq!(content.text_for("title"), "Hello");
        assert!(content.image_for("main").is_some());
        assert!(content.image_for("gone").is_none());

        // 1x1 image over a 401x401 box: centered offset is (1 - 401) / 2.
        let t = content.transform_for("main");
        assert_eq!(t.x, -200.0);
        assert_eq!(t.y, -200.0);
        assert_eq!(t.scale, 1.0);
    }

    #[test]
    fn explicit_transforms_win_over_centering() {
        let fetcher = MemFetcher {
            files: BTreeMap::from([("art.png".to_string(), tiny_png())]),
        };
        let template: Template = serde_json::from_value(serde_json::json!({
            "id": "t", "name": "t", "width": 600, "height": 800,
            "imageAreas": [ { "id": "main", "width": 100, "height": 100 } ]
        }))
        .unwrap();
        let doc = ContentDoc {
            text_content: BTreeMap::new(),
            image_content: BTreeMap::from([("main".to_string(), "art.png".to_string())]),
            image_transforms: BTreeMap::from([(
                "main".to_string(),
                ImageTransform {
                    x: 7.0,
                    y: 8.0,
                    scale: 2.0,
                },
            )]),
        };

        let content = resolve_content(&fetcher, &doc, &template);
        assert_eq!(content.transform_for("main").x, 7.0);
        assert_eq!(content.transform_for("main").scale, 2.0);
    }
}
