use kurbo::Affine;

use crate::model::{TextAlign, TextLayer};

/// Resolved coordinate math for one layer, shared by the raster compositor
/// and the live preview so the two rendering paths cannot drift apart.
///
/// `anchor_x`/`anchor_y` are the layer's `(x, y)` in template pixel space;
/// `baseline_y` treats `y` as the top of the text box with the baseline one
/// `font_size` below it. Rotation pivots about the anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerPlacement {
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub baseline_y: f64,
    pub rotation_deg: f64,
    pub align: TextAlign,
}

impl LayerPlacement {
    pub fn of(layer: &TextLayer) -> Self {
        Self {
            anchor_x: layer.x,
            anchor_y: layer.y,
            baseline_y: layer.y + layer.font_size,
            rotation_deg: layer.rotation,
            align: layer.text_align,
        }
    }

    /// Transform applied before drawing glyphs: translate to the anchor,
    /// then rotate about it.
    pub fn transform(&self) -> Affine {
        Affine::translate((self.anchor_x, self.anchor_y))
            * Affine::rotate(self.rotation_deg.to_radians())
    }

    /// Horizontal shift of the text box relative to the anchor, given the
    /// measured text width.
    pub fn aligned_offset(&self, measured_width: f64) -> f64 {
        aligned_offset(self.align, measured_width)
    }
}

pub fn aligned_offset(align: TextAlign, measured_width: f64) -> f64 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => -measured_width / 2.0,
        TextAlign::Right => -measured_width,
    }
}

/// Uniform preview scale: the whole layer stack scales together from the
/// preview's top-left corner, never past 1:1. Scaling layers independently
/// would break layout parity with the raster output.
pub fn preview_scale(preview_width: f64, template_width: u32) -> f64 {
    if template_width == 0 {
        return 1.0;
    }
    (preview_width / f64::from(template_width)).min(1.0)
}
