use chrono::{DateTime, Utc};

use crate::{
    color::ColorDef,
    error::{ImprintError, ImprintResult},
};

/// Default canvas size used when a template has no background image.
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextShadow {
    pub enabled: bool,
    pub color: ColorDef,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
    #[serde(default)]
    pub blur: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStroke {
    pub enabled: bool,
    pub color: ColorDef,
    pub width: f64,
}

/// One positioned, styled text overlay. `x`/`y` are in template pixel space;
/// `text_align` decides which edge of the text box `x` anchors.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    pub id: String,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub font_family: String,
    #[serde(default)]
    pub color: ColorDef,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub text_align: TextAlign,
    #[serde(default)]
    pub is_variable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_shadow: Option<TextShadow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_stroke: Option<TextStroke>,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub rotation: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl TextLayer {
    pub fn new(id: impl Into<String>, text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            x,
            y,
            font_size: 24.0,
            font_family: "Arial".to_string(),
            color: ColorDef::BLACK,
            font_weight: FontWeight::Normal,
            text_align: TextAlign::Left,
            is_variable: false,
            variable_name: None,
            text_shadow: None,
            text_stroke: None,
            opacity: 1.0,
            rotation: 0.0,
        }
    }

    pub fn validate(&self) -> ImprintResult<()> {
        if self.id.trim().is_empty() {
            return Err(ImprintError::validation("layer id must be non-empty"));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(ImprintError::validation(format!(
                "layer '{}' font_size must be finite and > 0",
                self.id
            )));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(ImprintError::validation(format!(
                "layer '{}' opacity must be within [0, 1]",
                self.id
            )));
        }
        if !self.rotation.is_finite() {
            return Err(ImprintError::validation(format!(
                "layer '{}' rotation must be finite",
                self.id
            )));
        }
        if let Some(stroke) = &self.text_stroke
            && (!stroke.width.is_finite() || stroke.width < 0.0)
        {
            return Err(ImprintError::validation(format!(
                "layer '{}' stroke width must be finite and >= 0",
                self.id
            )));
        }
        if let Some(shadow) = &self.text_shadow
            && (!shadow.blur.is_finite() || shadow.blur < 0.0)
        {
            return Err(ImprintError::validation(format!(
                "layer '{}' shadow blur must be finite and >= 0",
                self.id
            )));
        }
        Ok(())
    }
}

/// A named composition: background reference + ordered text layers.
///
/// Layer order in `text_layers` is the z-order (later layers draw on top) and
/// is preserved by every mutation helper except the explicit layout tools.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Background image source, resolved relative to the compositor's asset
    /// root. `None` renders onto a blank surface at `width`×`height`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(default)]
    pub text_layers: Vec<TextLayer>,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            background_image: None,
            text_layers: Vec::new(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> ImprintResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ImprintError::validation("template width/height must be > 0"));
        }
        for layer in &self.text_layers {
            layer.validate()?;
        }
        Ok(())
    }

    fn touched(mut self) -> Self {
        self.updated_at = Utc::now();
        self
    }

    /// Set the background source together with its intrinsic dimensions.
    ///
    /// Canvas dimensions always track the background's native size while a
    /// background is present.
    pub fn with_background(mut self, source: impl Into<String>, width: u32, height: u32) -> Self {
        self.background_image = Some(source.into());
        self.width = width;
        self.height = height;
        self.touched()
    }

    pub fn with_layer_added(mut self, layer: TextLayer) -> Self {
        self.text_layers.push(layer);
        self.touched()
    }

    /// Replace the layer with the same id in place, keeping its z position.
    pub fn with_layer_updated(mut self, layer: TextLayer) -> ImprintResult<Self> {
        let slot = self
            .text_layers
            .iter_mut()
            .find(|l| l.id == layer.id)
            .ok_or_else(|| {
                ImprintError::validation(format!("no layer with id '{}' to update", layer.id))
            })?;
        *slot = layer;
        Ok(self.touched())
    }

    pub fn with_layer_removed(mut self, layer_id: &str) -> Self {
        self.text_layers.retain(|l| l.id != layer_id);
        self.touched()
    }
}

/// Encode a layer sequence for storage transport.
///
/// The persistence collaborator stores `text_layers` as a single text column;
/// decoding restores the same ordered sequence.
pub fn encode_layers(layers: &[TextLayer]) -> ImprintResult<String> {
    serde_json::to_string(layers)
        .map_err(|e| ImprintError::serde(format!("encode text layers: {e}")))
}

pub fn decode_layers(encoded: &str) -> ImprintResult<Vec<TextLayer>> {
    serde_json::from_str(encoded)
        .map_err(|e| ImprintError::serde(format!("decode text layers: {e}")))
}
