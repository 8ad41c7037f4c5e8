#![forbid(unsafe_code)]

pub mod arrange;
pub mod batch;
pub mod blur;
pub mod color;
pub mod composite;
pub mod compositor;
pub mod error;
pub mod fonts;
pub mod model;
pub mod placement;
pub mod preview;
pub mod text;
pub mod vars;

pub use arrange::{auto_arrange, grid_arrange};
pub use batch::{BatchOutcome, GeneratedImage, Table, parse_table, run_batch};
pub use color::ColorDef;
pub use compositor::{Compositor, Frame, encode_png, suggested_filename};
pub use error::{ImprintError, ImprintResult};
pub use fonts::FontCatalog;
pub use model::{
    FontWeight, Template, TextAlign, TextLayer, TextShadow, TextStroke, decode_layers,
    encode_layers,
};
pub use placement::{LayerPlacement, preview_scale};
pub use preview::{PreviewDocument, PreviewLayer, render_preview};
pub use vars::{Bindings, extract_variable_names, resolve_text, variable_key};
