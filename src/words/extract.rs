use tracing::debug;

use crate::settings::Thresholds;
use crate::vision::{OcrWord, TextAnnotation};

use super::Word;
use super::geom::vertical_span;

/// Flattens the annotation in page, block, paragraph, word order, keeping
/// confident words tall enough to read and tagging tall ones as kanji.
pub fn words_from_annotation(annotation: &TextAnnotation, thresholds: &Thresholds) -> Vec<Word> {
    annotation
        .pages
        .iter()
        .flat_map(|page| &page.blocks)
        .flat_map(|block| &block.paragraphs)
        .flat_map(|paragraph| &paragraph.words)
        .filter_map(|word| classify_word(word, thresholds))
        .collect()
}

fn classify_word(word: &OcrWord, thresholds: &Thresholds) -> Option<Word> {
    let text = word.text();
    let vertices = word
        .bounding_box
        .as_ref()
        .map(|bbox| bbox.vertices.as_slice())
        .unwrap_or_default();
    // top-left, top-right, bottom-right
    let [top_left, top_right, bottom_right, ..] = vertices else {
        debug!("skipping '{}': bounding box has {} vertices", text, vertices.len());
        return None;
    };

    let height = vertical_span(*top_left, *bottom_right);
    if word.confidence < thresholds.min_confidence {
        debug!(
            "skipping '{}': confidence {:.2} below {:.2}",
            text, word.confidence, thresholds.min_confidence
        );
        return None;
    }
    if height < thresholds.min_word_height {
        debug!(
            "skipping '{}': height {} below {}",
            text, height, thresholds.min_word_height
        );
        return None;
    }

    let is_kanji = height >= thresholds.min_kanji_height;
    Some(Word::new(
        text,
        (top_left.x, top_left.y),
        (top_right.x, bottom_right.y),
        is_kanji,
    ))
}
