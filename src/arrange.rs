use crate::model::Template;

/// Fixed padding from the canvas edges used by both layout tools.
pub const PADDING: f64 = 50.0;
/// Vertical distance between rows in the auto layout.
pub const LINE_HEIGHT: f64 = 60.0;
/// Layers never move below `height - BOTTOM_MARGIN`.
pub const BOTTOM_MARGIN: f64 = 50.0;

/// Stack every layer along the left edge, one per line.
///
/// Deterministic in layer count and template size only; prior positions do
/// not matter. Only `x`/`y` change; order and styling stay untouched.
pub fn auto_arrange(template: &Template) -> Template {
    let mut out = template.clone();
    let max_y = f64::from(out.height) - BOTTOM_MARGIN;
    for (index, layer) in out.text_layers.iter_mut().enumerate() {
        layer.x = PADDING;
        layer.y = (PADDING + index as f64 * LINE_HEIGHT).min(max_y);
    }
    touch(out)
}

/// Place layers on a near-square grid: `cols = ceil(sqrt(n))` columns,
/// `ceil(n / cols)` rows, each layer offset inside its cell and clamped to
/// the template bounds.
pub fn grid_arrange(template: &Template) -> Template {
    let mut out = template.clone();
    let count = out.text_layers.len();
    if count == 0 {
        return touch(out);
    }

    let cols = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);
    let cell_w = (f64::from(out.width) - 2.0 * PADDING) / cols as f64;
    let cell_h = (f64::from(out.height) - 2.0 * PADDING) / rows as f64;

    let max_x = f64::from(out.width) - PADDING;
    let max_y = f64::from(out.height) - BOTTOM_MARGIN;
    for (index, layer) in out.text_layers.iter_mut().enumerate() {
        let col = index % cols;
        let row = index / cols;
        layer.x = (PADDING + col as f64 * cell_w + cell_w / 4.0).clamp(0.0, max_x);
        layer.y = (PADDING + row as f64 * cell_h + cell_h / 4.0).clamp(0.0, max_y);
    }
    touch(out)
}

fn touch(mut template: Template) -> Template {
    template.updated_at = chrono::Utc::now();
    template
}
