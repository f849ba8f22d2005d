#![forbid(unsafe_code)]

pub mod assets;
pub mod color;
pub mod compositor;
pub mod content;
pub mod error;
pub mod export;
pub mod layout;
pub mod model;
pub mod raster;
pub mod shape;
pub mod surface;

pub use assets::{
    PreparedImage,
    loader::{AssetFetcher, FsFetcher, LoadedLayer},
};
pub use color::Rgba8;
pub use compositor::{RenderContext, RenderReport, RenderSettings, render_card};
pub use content::{ContentDoc, ImageTransform, UserContent};
pub use error::{CardError, CardResult};
pub use export::{BleedSpec, ExportOptions, compose_bleed, encode_png, export_file_name};
pub use layout::{FontSpec, GroupLayouts, TextMeasure};
pub use model::{Align, FillMode, LockPosition, Template};
pub use raster::RasterSurface;
pub use shape::{Shape, ShapeKind};
pub use surface::{FrameRgba, Surface};
