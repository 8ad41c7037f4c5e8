use imprint::{
    Bindings, LayerPlacement, Template, TextLayer, preview_scale, render_preview,
};

fn template() -> Template {
    let mut a = TextLayer::new("a", "Title", 50.0, 50.0);
    a.font_size = 24.0;
    a.rotation = 15.0;
    let mut b = TextLayer::new("b", "name", 120.0, 300.0);
    b.is_variable = true;
    b.variable_name = Some("name".to_string());
    Template::new("t0", "Parity")
        .with_layer_added(a)
        .with_layer_added(b)
}

#[test]
fn preview_boxes_sit_at_the_compositor_anchor_points() {
    let template = template();
    let doc = render_preview(&template, &Bindings::new(), 400.0);

    for (layer, preview) in template.text_layers.iter().zip(&doc.layers) {
        let placement = LayerPlacement::of(layer);
        assert_eq!(preview.left, placement.anchor_x);
        assert_eq!(preview.top, placement.anchor_y);
        assert_eq!(preview.rotation, placement.rotation_deg);
    }
}

#[test]
fn one_scale_for_the_whole_stack() {
    let template = template();
    let doc = render_preview(&template, &Bindings::new(), 400.0);
    assert_eq!(doc.scale, preview_scale(400.0, template.width));

    // Coordinates stay unscaled; only the document scale shrinks the stack.
    assert_eq!(doc.layers[1].left, 120.0);

    let html = doc.to_html();
    assert_eq!(html.matches("transform:scale(").count(), 1);
}

#[test]
fn preview_and_substitution_agree_on_placeholders() {
    let template = template();

    let doc = render_preview(&template, &Bindings::new(), 800.0);
    assert_eq!(doc.layers[1].text, "{{name}}");

    let mut bindings = Bindings::new();
    bindings.insert("name".to_string(), "Ada".to_string());
    let doc = render_preview(&template, &bindings, 800.0);
    assert_eq!(doc.layers[1].text, "Ada");
}
