use kurbo::{BezPath, Circle, Point, Rect, Shape as _};

/// Shape kind as named by the template document. Unknown kinds deserialize
/// as [`ShapeKind::Rectangle`] so a template with a misspelled shape still
/// clips instead of failing the load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Circle,
    Diamond,
    Trapezoid,
}

impl<'de> serde::Deserialize<'de> for ShapeKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "circle" => ShapeKind::Circle,
            "diamond" => ShapeKind::Diamond,
            "trapezoid" => ShapeKind::Trapezoid,
            _ => ShapeKind::Rectangle,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrapezoidParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_width: Option<f64>,
}

/// Clip boundary for an image region, parameters resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Rectangle,
    Circle,
    Diamond,
    Trapezoid {
        /// Width of the inset top edge; defaults to 80% of the box width.
        top_width: Option<f64>,
    },
}

/// Flattening tolerance for curved clip boundaries, in pixels.
const CIRCLE_TOLERANCE: f64 = 0.1;

impl Shape {
    /// Closed clip path for this shape scoped to `rect`.
    pub fn clip_path(&self, rect: Rect) -> BezPath {
        match *self {
            Shape::Rectangle => rect.to_path(CIRCLE_TOLERANCE),
            Shape::Circle => {
                let r = rect.width().min(rect.height()) / 2.0;
                Circle::new(rect.center(), r).to_path(CIRCLE_TOLERANCE)
            }
            Shape::Diamond => {
                let (cx, cy) = (rect.center().x, rect.center().y);
                let mut path = BezPath::new();
                path.move_to(Point::new(cx, rect.y0));
                path.line_to(Point::new(rect.x1, cy));
                path.line_to(Point::new(cx, rect.y1));
                path.line_to(Point::new(rect.x0, cy));
                path.close_path();
                path
            }
            Shape::Trapezoid { top_width } => {
                let top = top_width.unwrap_or(rect.width() * 0.8);
                let inset = (rect.width() - top) / 2.0;
                let mut path = BezPath::new();
                path.move_to(Point::new(rect.x0 + inset, rect.y0));
                path.line_to(Point::new(rect.x1 - inset, rect.y0));
                path.line_to(Point::new(rect.x1, rect.y1));
                path.line_to(Point::new(rect.x0, rect.y1));
                path.close_path();
                path
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_box() -> Rect {
        Rect::new(100.0, 160.0, 500.0, 560.0)
    }

    #[test]
    fn unknown_kind_falls_back_to_rectangle() {
        let k: ShapeKind = serde_json::from_str("\"hexagon\"").unwrap();
        assert_eq!(k, ShapeKind::Rectangle);
        let k: ShapeKind = serde_json::from_str("\"circle\"").unwrap();
        assert_eq!(k, ShapeKind::Circle);
    }

    #[test]
    fn fallback_clips_identically_to_explicit_rectangle() {
        let explicit = Shape::Rectangle.clip_path(region_box());
        let k: ShapeKind = serde_json::from_str("\"blob\"").unwrap();
        assert_eq!(k, ShapeKind::Rectangle);
        let fallback = Shape::Rectangle.clip_path(region_box());
        assert_eq!(explicit.elements(), fallback.elements());
    }

    #[test]
    fn diamond_touches_edge_midpoints() {
        let path = Shape::Diamond.clip_path(region_box());
        let bbox = path.bounding_box();
        assert_eq!(bbox, region_box());
        // First vertex is the top-edge midpoint.
        let kurbo::PathEl::MoveTo(p) = path.elements()[0] else {
            panic!("diamond must start with MoveTo");
        };
        assert_eq!(p, Point::new(300.0, 160.0));
    }

    #[test]
    fn trapezoid_defaults_to_80_percent_top() {
        let path = Shape::Trapezoid { top_width: None }.clip_path(region_box());
        let kurbo::PathEl::MoveTo(p) = path.elements()[0] else {
            panic!("trapezoid must start with MoveTo");
        };
        // box width 400, default top 320, inset 40
        assert_eq!(p, Point::new(140.0, 160.0));

        let path = Shape::Trapezoid {
            top_width: Some(200.0),
        }
        .clip_path(region_box());
        let kurbo::PathEl::MoveTo(p) = path.elements()[0] else {
            panic!("trapezoid must start with MoveTo");
        };
        assert_eq!(p, Point::new(200.0, 160.0));
    }

    #[test]
    fn circle_radius_is_half_shorter_dimension() {
        let rect = Rect::new(0.0, 0.0, 100.0, 60.0);
        let path = Shape::Circle.clip_path(rect);
        let bbox = path.bounding_box();
        assert!((bbox.width() - 60.0).abs() < 0.5);
        assert!((bbox.height() - 60.0).abs() < 0.5);
        assert!((bbox.center().x - 50.0).abs() < 0.5);
        assert!((bbox.center().y - 30.0).abs() < 0.5);
    }
}
