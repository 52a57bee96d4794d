//! Pretty-printed JSON document.

use chrono::Utc;

use favs_shared::{FavsError, FilteredCollection, RenderOptions, Renderer, RendererOptions, Result};

use crate::document::{Document, FolderStyle};

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn name(&self) -> &str {
        "json"
    }

    fn display_name(&self) -> &str {
        "JSON"
    }

    fn file_extensions(&self) -> &[&str] {
        &[".json"]
    }

    fn configure(&self, _options: RendererOptions) -> Result<()> {
        Ok(())
    }

    fn render(&self, collection: &FilteredCollection, options: &RenderOptions) -> Result<Vec<u8>> {
        let document = Document::build(collection, options, FolderStyle::List, Utc::now());
        let mut out =
            serde_json::to_vec_pretty(&document).map_err(|e| FavsError::render("json", e))?;
        out.push(b'\n');
        Ok(out)
    }
}
