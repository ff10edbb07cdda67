//! Subset of the Cloud Vision `images:annotate` response needed to recover
//! word boxes from a `DOCUMENT_TEXT_DETECTION` request.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BatchAnnotateImagesResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnnotateImageResponse {
    pub full_text_annotation: Option<TextAnnotation>,
    pub error: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Status {
    pub code: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextAnnotation {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub words: Vec<OcrWord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrWord {
    pub bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub confidence: f32,
}

impl OcrWord {
    pub fn text(&self) -> String {
        self.symbols
            .iter()
            .map(|symbol| symbol.text.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

/// The service omits coordinates equal to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Symbol {
    #[serde(default)]
    pub text: String,
}
