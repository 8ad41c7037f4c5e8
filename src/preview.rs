use std::fmt::Write as _;

use crate::{
    model::{FontWeight, Template, TextAlign},
    placement::{LayerPlacement, preview_scale},
    vars::{Bindings, resolve_text},
};

/// One positioned preview box. `left`/`top` are the layer's `(x, y)` in
/// unscaled template coordinates; the document-level `scale` is applied to
/// the whole stack at once.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewLayer {
    pub id: String,
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
    pub font_weight: FontWeight,
    pub text_align: TextAlign,
    pub opacity: f64,
    pub rotation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_css: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_css: Option<String>,
}

/// A scalable markup approximation of the raster output.
///
/// Placement comes from the same [`LayerPlacement`] math the compositor
/// uses; the preview only differs in how a resolved, positioned, styled text
/// box gets painted. It never invokes the compositor.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewDocument {
    pub width: u32,
    pub height: u32,
    /// Single shared scale, origin at the preview's top-left.
    pub scale: f64,
    pub layers: Vec<PreviewLayer>,
}

/// Build the preview for a template and (possibly partial) bindings.
/// Unbound variables show their `{{key}}` placeholder, same as an export.
pub fn render_preview(template: &Template, bindings: &Bindings, preview_width: f64) -> PreviewDocument {
    let scale = preview_scale(preview_width, template.width);
    let layers = template
        .text_layers
        .iter()
        .map(|layer| {
            let placement = LayerPlacement::of(layer);
            PreviewLayer {
                id: layer.id.clone(),
                text: resolve_text(layer, bindings),
                left: placement.anchor_x,
                top: placement.anchor_y,
                font_size: layer.font_size,
                font_family: layer.font_family.clone(),
                color: layer.color.to_css(),
                font_weight: layer.font_weight,
                text_align: layer.text_align,
                opacity: layer.opacity,
                rotation: placement.rotation_deg,
                shadow_css: layer.text_shadow.as_ref().filter(|s| s.enabled).map(|s| {
                    format!(
                        "{}px {}px {}px {}",
                        s.offset_x,
                        s.offset_y,
                        s.blur,
                        s.color.to_css()
                    )
                }),
                stroke_css: layer.text_stroke.as_ref().filter(|s| s.enabled).map(|s| {
                    format!("{}px {}", s.width, s.color.to_css())
                }),
            }
        })
        .collect();

    PreviewDocument {
        width: template.width,
        height: template.height,
        scale,
        layers,
    }
}

impl PreviewDocument {
    /// Emit absolutely positioned markup mirroring the compositor's styling.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<div class=\"imprint-preview\" style=\"position:relative;overflow:hidden;\
             width:{w}px;height:{h}px;transform:scale({s});transform-origin:top left;\">",
            w = self.width,
            h = self.height,
            s = self.scale,
        );

        for layer in &self.layers {
            let mut style = String::new();
            let _ = write!(
                style,
                "position:absolute;left:{left}px;top:{top}px;white-space:pre;line-height:1;\
                 font-size:{size}px;font-family:{family};color:{color};opacity:{opacity};",
                left = layer.left,
                top = layer.top,
                size = layer.font_size,
                family = layer.font_family,
                color = layer.color,
                opacity = layer.opacity,
            );
            if layer.font_weight == FontWeight::Bold {
                style.push_str("font-weight:bold;");
            }
            if let Some(shadow) = &layer.shadow_css {
                let _ = write!(style, "text-shadow:{shadow};");
            }
            if let Some(stroke) = &layer.stroke_css {
                let _ = write!(style, "-webkit-text-stroke:{stroke};");
            }

            // Rotation about the anchor, then the alignment shift inside the
            // rotated space, matching the raster pass order.
            let align_shift = match layer.text_align {
                TextAlign::Left => None,
                TextAlign::Center => Some("translateX(-50%)"),
                TextAlign::Right => Some("translateX(-100%)"),
            };
            if layer.rotation != 0.0 || align_shift.is_some() {
                style.push_str("transform-origin:0 0;transform:");
                if layer.rotation != 0.0 {
                    let _ = write!(style, "rotate({}deg)", layer.rotation);
                }
                if let Some(shift) = align_shift {
                    if layer.rotation != 0.0 {
                        style.push(' ');
                    }
                    style.push_str(shift);
                }
                style.push(';');
            }

            let _ = write!(
                html,
                "<span data-layer-id=\"{id}\" style=\"{style}\">{text}</span>",
                id = escape_html(&layer.id),
                text = escape_html(&layer.text),
            );
        }

        html.push_str("</div>");
        html
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
