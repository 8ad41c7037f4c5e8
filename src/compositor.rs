use std::{collections::HashMap, io::Cursor, path::PathBuf};

use anyhow::Context as _;

use crate::{
    blur::blur_rgba8_premul,
    composite::over_in_place,
    error::{ImprintError, ImprintResult},
    fonts::{FontCatalog, ResolvedFont},
    model::{Template, TextLayer},
    placement::LayerPlacement,
    text::{ShapedText, TextBrushRgba8, TextLayoutEngine},
    vars::{Bindings, resolve_text},
};

/// One rendered surface: premultiplied RGBA8 at exactly the template's size.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

/// Paints a template plus resolved substitutions onto a pixel surface.
///
/// Layers draw in `text_layers` order (later on top). Each layer's passes
/// (shadow, stroke, fill) merge into a fresh group surface that is composited
/// over the accumulated frame at the layer's opacity, so no transform, paint
/// or opacity state can leak between layers.
pub struct Compositor {
    assets_root: PathBuf,
    catalog: FontCatalog,
    text: TextLayoutEngine,
    font_cache: HashMap<String, vello_cpu::peniko::FontData>,
}

impl Compositor {
    pub fn new(assets_root: impl Into<PathBuf>, catalog: FontCatalog) -> Self {
        Self {
            assets_root: assets_root.into(),
            catalog,
            text: TextLayoutEngine::new(),
            font_cache: HashMap::new(),
        }
    }

    /// Render the template with the given bindings.
    ///
    /// A background that fails to read or decode is logged and skipped; the
    /// layers still render onto a blank surface. Unbound variables render as
    /// their `{{key}}` placeholder.
    #[tracing::instrument(skip_all, fields(template = %template.id))]
    pub fn render(&mut self, template: &Template, bindings: &Bindings) -> ImprintResult<Frame> {
        template.validate()?;

        let (width, height) = (template.width, template.height);
        let mut frame = vec![0u8; surface_len(width, height)?];

        if let Some(source) = &template.background_image {
            match self.load_background(source, width, height) {
                Ok(bg) => frame.copy_from_slice(&bg),
                Err(err) => {
                    tracing::warn!(source = %source, %err, "background failed to decode; rendering without it");
                }
            }
        }

        for layer in &template.text_layers {
            self.draw_layer(&mut frame, width, height, layer, bindings)?;
        }

        Ok(Frame {
            width,
            height,
            data: frame,
            premultiplied: true,
        })
    }

    /// Render and encode as a lossless PNG, returning the bytes together
    /// with a filename suggestion derived from the template name.
    pub fn render_png(
        &mut self,
        template: &Template,
        bindings: &Bindings,
    ) -> ImprintResult<(Vec<u8>, String)> {
        let frame = self.render(template, bindings)?;
        let png = encode_png(&frame)?;
        Ok((png, suggested_filename(&template.name)))
    }

    fn load_background(&self, source: &str, width: u32, height: u32) -> ImprintResult<Vec<u8>> {
        let path = self.assets_root.join(source);
        let bytes =
            std::fs::read(&path).with_context(|| format!("read background '{}'", path.display()))?;
        let dyn_img = image::load_from_memory(&bytes).context("decode background image")?;

        // Stretched exactly to the canvas; aspect ratio is intentionally not
        // preserved.
        let resized =
            image::imageops::resize(&dyn_img.to_rgba8(), width, height, image::imageops::FilterType::Triangle);
        let mut data = resized.into_raw();
        premultiply_rgba8_in_place(&mut data);
        Ok(data)
    }

    fn draw_layer(
        &mut self,
        frame: &mut [u8],
        width: u32,
        height: u32,
        layer: &TextLayer,
        bindings: &Bindings,
    ) -> ImprintResult<()> {
        let text = resolve_text(layer, bindings);
        if text.is_empty() {
            return Ok(());
        }

        let face = self.catalog.resolve(&layer.font_family)?;
        let [r, g, b, a] = layer.color.to_rgba8();
        let shaped = self.text.shape(
            &text,
            &face,
            layer.font_size as f32,
            layer.font_weight,
            TextBrushRgba8 { r, g, b, a },
        )?;

        let placement = LayerPlacement::of(layer);
        let dx = placement.aligned_offset(shaped.width);
        // Pin the first baseline one font_size below the layer's y.
        let dy = layer.font_size - shaped.first_baseline;
        let transform = placement.transform();

        // Shadow, stroke and fill accumulate into one group surface that is
        // composited once at the layer's opacity, matching the single CSS
        // opacity on the preview's layer box. Compositing each pass at the
        // layer opacity would let a shadow bleed through semi-transparent
        // glyphs above it.
        let mut group = vec![0u8; surface_len(width, height)?];

        if let Some(shadow) = &layer.text_shadow
            && shadow.enabled
        {
            let pass = self.rasterize_glyphs(
                width,
                height,
                &face,
                &shaped,
                transform,
                dx + shadow.offset_x,
                dy + shadow.offset_y,
                PassStyle::OverrideFill(shadow.color.to_rgba8()),
            )?;
            let pass = if shadow.blur > 0.0 {
                let radius = shadow.blur.ceil() as u32;
                let sigma = (shadow.blur / 2.0).max(0.5) as f32;
                blur_rgba8_premul(&pass, width, height, radius, sigma)?
            } else {
                pass
            };
            over_in_place(&mut group, &pass, 1.0)?;
        }

        let stroke = layer
            .text_stroke
            .as_ref()
            .filter(|s| s.enabled && s.width > 0.0)
            .map(|s| (s.color.to_rgba8(), s.width));
        let pass = self.rasterize_glyphs(
            width,
            height,
            &face,
            &shaped,
            transform,
            dx,
            dy,
            PassStyle::StrokeThenFill { stroke },
        )?;
        over_in_place(&mut group, &pass, 1.0)?;

        over_in_place(frame, &group, layer.opacity as f32)?;

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn rasterize_glyphs(
        &mut self,
        width: u32,
        height: u32,
        face: &ResolvedFont,
        shaped: &ShapedText,
        transform: kurbo::Affine,
        dx: f64,
        dy: f64,
        style: PassStyle,
    ) -> ImprintResult<Vec<u8>> {
        let width_u16: u16 = width
            .try_into()
            .map_err(|_| ImprintError::render("surface width exceeds u16"))?;
        let height_u16: u16 = height
            .try_into()
            .map_err(|_| ImprintError::render("surface height exceeds u16"))?;

        let font = self.font_for(face);
        let mut pixmap = vello_cpu::Pixmap::new(width_u16, height_u16);
        let mut ctx = vello_cpu::RenderContext::new(width_u16, height_u16);
        ctx.set_transform(affine_to_cpu(transform));

        if let PassStyle::StrokeThenFill {
            stroke: Some((color, stroke_width)),
        } = style
        {
            // Stroke sits entirely under the fill.
            ctx.set_paint(color_to_cpu(color));
            ctx.set_stroke(vello_cpu::kurbo::Stroke::new(stroke_width));
            for (run, glyphs) in glyph_runs(shaped, dx, dy) {
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .stroke_glyphs(glyphs.into_iter());
            }
        }

        for (run, glyphs) in glyph_runs(shaped, dx, dy) {
            match style {
                PassStyle::OverrideFill(color) => ctx.set_paint(color_to_cpu(color)),
                PassStyle::StrokeThenFill { .. } => {
                    let brush = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        brush.r, brush.g, brush.b, brush.a,
                    ));
                }
            }
            ctx.glyph_run(&font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs.into_iter());
        }

        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);
        Ok(pixmap.data_as_u8_slice().to_vec())
    }

    fn font_for(&mut self, face: &ResolvedFont) -> vello_cpu::peniko::FontData {
        if let Some(font) = self.font_cache.get(&face.family) {
            return font.clone();
        }
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(face.bytes.as_ref().clone()),
            0,
        );
        self.font_cache.insert(face.family.clone(), font.clone());
        font
    }
}

#[derive(Clone, Copy)]
enum PassStyle {
    /// Every glyph fills with one color (shadow pass).
    OverrideFill([u8; 4]),
    /// Optional stroke under the per-run brush fill.
    StrokeThenFill { stroke: Option<([u8; 4], f64)> },
}

fn glyph_runs<'a>(
    shaped: &'a ShapedText,
    dx: f64,
    dy: f64,
) -> Vec<(
    parley::layout::GlyphRun<'a, TextBrushRgba8>,
    Vec<vello_cpu::Glyph>,
)> {
    let (dx, dy) = (dx as f32, dy as f32);
    let mut out = Vec::new();
    for line in shaped.layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let glyphs = run
                .glyphs()
                .map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x + dx,
                    y: g.y + dy,
                })
                .collect();
            out.push((run, glyphs));
        }
    }
    out
}

fn affine_to_cpu(a: kurbo::Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn color_to_cpu([r, g, b, a]: [u8; 4]) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

fn surface_len(width: u32, height: u32) -> ImprintResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| ImprintError::render("surface size overflow"))
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn unpremultiply_rgba8(premul: &[u8]) -> Vec<u8> {
    let mut out = premul.to_vec();
    for px in out.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[0..3] {
            *c = (((*c as u16) * 255 + a / 2) / a).min(255) as u8;
        }
    }
    out
}

/// Encode a frame as a lossless PNG (straight alpha).
pub fn encode_png(frame: &Frame) -> ImprintResult<Vec<u8>> {
    let data = if frame.premultiplied {
        unpremultiply_rgba8(&frame.data)
    } else {
        frame.data.clone()
    };

    let mut out = Vec::new();
    image::write_buffer_with_format(
        &mut Cursor::new(&mut out),
        &data,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .context("encode png")?;
    Ok(out)
}

/// Filename suggestion for a single export, derived from the template name.
pub fn suggested_filename(template_name: &str) -> String {
    let slug: String = template_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "template.png".to_string()
    } else {
        format!("{slug}.png")
    }
}
