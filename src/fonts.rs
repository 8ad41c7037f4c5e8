use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::Context as _;

use crate::error::{ImprintError, ImprintResult};

/// A resolved font face: the catalog key it matched plus its raw bytes.
#[derive(Clone, Debug)]
pub struct ResolvedFont {
    pub family: String,
    pub bytes: Arc<Vec<u8>>,
}

/// Named font families backed by raw TTF/OTF bytes.
///
/// `font_family` on a layer is free-form and matched case-insensitively; an
/// unknown family falls back to the first registered one (best effort, as
/// promised to callers). Rendering text with an empty catalog is a
/// validation error surfaced before any drawing happens.
#[derive(Default)]
pub struct FontCatalog {
    families: HashMap<String, ResolvedFont>,
    fallback: Option<String>,
}

impl FontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn register_family(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        self.families.insert(
            key.clone(),
            ResolvedFont {
                family: name,
                bytes: Arc::new(bytes),
            },
        );
        if self.fallback.is_none() {
            self.fallback = Some(key);
        }
    }

    pub fn register_family_from_file(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> ImprintResult<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("read font file '{}'", path.display()))?;
        self.register_family(name, bytes);
        Ok(())
    }

    pub fn resolve(&self, family: &str) -> ImprintResult<ResolvedFont> {
        if let Some(face) = self.families.get(&family.to_ascii_lowercase()) {
            return Ok(face.clone());
        }
        let fallback = self.fallback.as_ref().ok_or_else(|| {
            ImprintError::validation(
                "font catalog is empty; register at least one family before rendering text",
            )
        })?;
        Ok(self.families[fallback].clone())
    }
}
