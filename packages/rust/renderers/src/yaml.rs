//! YAML document, same shape as JSON with folders joined by `/`.

use chrono::Utc;

use favs_shared::{FavsError, FilteredCollection, RenderOptions, Renderer, RendererOptions, Result};

use crate::document::{Document, FolderStyle};

pub struct YamlRenderer;

impl Renderer for YamlRenderer {
    fn name(&self) -> &str {
        "yaml"
    }

    fn display_name(&self) -> &str {
        "YAML"
    }

    fn file_extensions(&self) -> &[&str] {
        &[".yaml", ".yml"]
    }

    fn configure(&self, _options: RendererOptions) -> Result<()> {
        Ok(())
    }

    fn render(&self, collection: &FilteredCollection, options: &RenderOptions) -> Result<Vec<u8>> {
        let document = Document::build(collection, options, FolderStyle::Joined, Utc::now());
        serde_yaml::to_string(&document)
            .map(String::into_bytes)
            .map_err(|e| FavsError::render("yaml", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn folders_are_joined() {
        let bytes = YamlRenderer
            .render(&fixtures::collection(), &RenderOptions::default())
            .expect("render");
        let doc: serde_yaml::Value = serde_yaml::from_slice(&bytes).expect("valid yaml");

        assert_eq!(doc["metadata"]["total"].as_u64(), Some(3));
        assert_eq!(
            doc["bookmarks"][0]["folder"].as_str(),
            Some("Bookmarks bar/Dev")
        );
        assert_eq!(doc["bookmarks"][1]["title"].as_str(), Some("Tom & Jerry <3"));
    }
}
