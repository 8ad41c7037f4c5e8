use std::collections::BTreeMap;

use crate::model::{Template, TextLayer};

/// Variable name -> substitution value for one generation request.
pub type Bindings = BTreeMap<String, String>;

/// The binding key a layer contributes: `variable_name` when present and
/// non-empty, otherwise the literal `text`.
pub fn variable_key(layer: &TextLayer) -> &str {
    match layer.variable_name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => layer.text.as_str(),
    }
}

/// Distinct variable names referenced by the template, in first-occurrence
/// order scanning `text_layers` front to back.
pub fn extract_variable_names(template: &Template) -> Vec<String> {
    let mut names = Vec::new();
    for layer in &template.text_layers {
        if !layer.is_variable {
            continue;
        }
        let key = variable_key(layer);
        if !names.iter().any(|n| n == key) {
            names.push(key.to_string());
        }
    }
    names
}

/// Resolve the literal string to render for one layer.
///
/// Unbound variables resolve to a `{{key}}` placeholder. The placeholder is
/// what both the preview and a raster export show when bindings are missing;
/// exporting it is by design, not an error.
pub fn resolve_text(layer: &TextLayer, bindings: &Bindings) -> String {
    if !layer.is_variable {
        return layer.text.clone();
    }
    let key = variable_key(layer);
    match bindings.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => format!("{{{{{key}}}}}"),
    }
}
