use cardpress::{ShapeKind, Template};

const STANDARD_CARD: &str = r##"{
  "id": "standard-card",
  "name": "Standard Card",
  "width": 600,
  "height": 800,
  "contentLayers": {
    "background": 10,
    "midground": 50,
    "foreground": 100
  },
  "layers": [
    { "id": "card-bg", "url": "standard-card/bg.png",
      "x": 0, "y": 0, "width": 600, "height": 800, "zIndex": 5 },
    { "id": "card-frame", "url": "standard-card/frame.png",
      "x": 0, "y": 0, "width": 600, "height": 800, "zIndex": 100 }
  ],
  "textAreas": [
    { "id": "card-title", "x": 50, "y": 60, "width": 500, "height": 80,
      "placeholder": "Card name", "fontSize": 36, "align": "center",
      "layer": "midground", "hasBackground": true, "lockPosition": "top" },
    { "id": "card-attribute", "x": 60, "y": 760, "width": 500, "height": 30,
      "placeholder": "Attributes", "fontSize": 14, "align": "right",
      "layer": "midground", "lockPosition": "bottom" }
  ],
  "imageAreas": [
    { "id": "main-image", "x": 100, "y": 160, "width": 400, "height": 400,
      "placeholder": "Main art", "shape": "rectangle", "layer": "midground" },
    { "id": "icon-image", "x": 480, "y": 70, "width": 60, "height": 60,
      "placeholder": "Icon", "shape": "circle", "layer": "foreground" }
  ],
  "verticalGroups": [
    { "id": "skills-area", "x": 60, "y": 200, "width": 480, "spacing": 15,
      "layer": "midground",
      "items": [
        { "id": "skill-1", "title": "First skill", "titleWidth": 100,
          "contentPlaceholder": "Describe the first skill...",
          "fontSize": 16, "titleFontSize": 18, "titleFontWeight": "bold",
          "hasBackground": true, "bgColor": "rgba(255, 255, 255, 0.7)",
          "titleLayer": {
            "text": "I",
            "fontSize": 20,
            "fontWeight": "bold",
            "textColor": "#5900ffff",
            "bgUrl": "standard-card/title-bg-1.png",
            "bgColor": "rgba(255, 183, 77, 0.8)",
            "zIndex": 60
          },
          "padding": { "top": 8, "right": 12, "bottom": 8, "left": 12 } },
        { "id": "skill-2", "title": "Second skill", "titleWidth": 100,
          "contentPlaceholder": "Describe the second skill...",
          "titleLayer": { "bgColor": "rgba(76, 175, 80, 0.8)" } }
      ] }
  ],
  "bleedBackground": { "url": "standard-card/bleed.png", "fillMode": "cover" }
}"##;

#[test]
fn full_document_parses_and_validates() {
    let t: Template = serde_json::from_str(STANDARD_CARD).unwrap();
    t.validate().unwrap();

    assert_eq!(t.width, 600);
    assert_eq!(t.content_layers["midground"], 50);
    assert_eq!(t.layers.len(), 2);
    assert_eq!(t.layers[1].z_index, 100);
    assert_eq!(t.text_areas[0].align, cardpress::Align::Center);
    assert_eq!(t.text_areas[1].lock_position, cardpress::LockPosition::Bottom);
    assert_eq!(t.image_areas[1].shape, ShapeKind::Circle);

    let group = &t.vertical_groups[0];
    assert_eq!(group.spacing, 15.0);
    assert_eq!(group.items[0].padding.left, 12.0);
    let title = group.items[0].title_layer.as_ref().unwrap();
    assert_eq!(title.font_size, Some(20.0));
    assert_eq!(title.z_index, 60);
    // Defaulted title layer still carries the standard title priority.
    assert_eq!(group.items[1].title_layer.as_ref().unwrap().z_index, 60);

    let bleed = t.bleed_background.as_ref().unwrap();
    assert_eq!(bleed.fill_mode, cardpress::FillMode::Cover);
}

#[test]
fn priorities_resolve_through_the_named_layers() {
    let t: Template = serde_json::from_str(STANDARD_CARD).unwrap();

    let title_area = &t.text_areas[0];
    assert_eq!(t.content_priority(title_area.z_index, &title_area.layer), 50);

    let icon = &t.image_areas[1];
    assert_eq!(t.content_priority(icon.z_index, &icon.layer), 100);

    // An unmapped layer name falls back to the default priority.
    assert_eq!(t.content_priority(None, "nonexistent"), 50);
    // An explicit value beats the named layer.
    assert_eq!(t.content_priority(Some(7), &icon.layer), 7);
}

#[test]
fn unknown_shape_strings_degrade_to_rectangle() {
    let mut doc: serde_json::Value = serde_json::from_str(STANDARD_CARD).unwrap();
    doc["imageAreas"][0]["shape"] = serde_json::json!("dodecagon");
    let t: Template = serde_json::from_value(doc).unwrap();
    assert_eq!(t.image_areas[0].shape, ShapeKind::Rectangle);
}

#[test]
fn duplicate_ids_fail_validation() {
    let mut doc: serde_json::Value = serde_json::from_str(STANDARD_CARD).unwrap();
    doc["imageAreas"][0]["id"] = serde_json::json!("skill-1");
    let t: Template = serde_json::from_value(doc).unwrap();
    assert!(t.validate().is_err());
}
