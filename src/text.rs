use std::collections::HashMap;

use crate::{
    error::{ImprintError, ImprintResult},
    fonts::ResolvedFont,
    model::FontWeight,
};

/// RGBA8 brush color carried through Parley glyph runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// A shaped, single-style text layout plus the measurements the compositor
/// needs to place it: total advance width and the first line's baseline
/// offset within the layout box.
pub struct ShapedText {
    pub layout: parley::Layout<TextBrushRgba8>,
    pub width: f64,
    pub first_baseline: f64,
}

impl std::fmt::Debug for ShapedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedText")
            .field("width", &self.width)
            .field("first_baseline", &self.first_baseline)
            .finish_non_exhaustive()
    }
}

/// Stateful helper for building Parley text layouts from catalog font bytes.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    // catalog family key -> fontique family name, so each face registers once
    registered: HashMap<String, String>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            registered: HashMap::new(),
        }
    }

    /// Shape and lay out plain text in the given face, size and weight.
    pub fn shape(
        &mut self,
        text: &str,
        face: &ResolvedFont,
        size_px: f32,
        weight: FontWeight,
        brush: TextBrushRgba8,
    ) -> ImprintResult<ShapedText> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ImprintError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let family_name = match self.registered.get(&face.family) {
            Some(name) => name.clone(),
            None => {
                let families = self.font_ctx.collection.register_fonts(
                    parley::fontique::Blob::from(face.bytes.as_ref().clone()),
                    None,
                );
                let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
                    ImprintError::validation(format!(
                        "no font families registered from bytes of '{}'",
                        face.family
                    ))
                })?;
                let name = self
                    .font_ctx
                    .collection
                    .family_name(family_id)
                    .ok_or_else(|| {
                        ImprintError::validation("registered font family has no name")
                    })?
                    .to_string();
                self.registered.insert(face.family.clone(), name.clone());
                name
            }
        };

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(match weight {
            FontWeight::Normal => parley::style::FontWeight::NORMAL,
            FontWeight::Bold => parley::style::FontWeight::BOLD,
        }));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);

        let first_baseline = layout
            .lines()
            .next()
            .map(|line| f64::from(line.metrics().baseline))
            .unwrap_or(0.0);

        Ok(ShapedText {
            width: f64::from(layout.width()),
            first_baseline,
            layout,
        })
    }
}
