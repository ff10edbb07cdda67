use crate::settings::Thresholds;
use crate::vision::Vertex;

use super::Word;

/// Distance between the right edge of `left` and the left edge of `right`.
/// Overlapping boxes yield the overlap width.
pub(super) fn horizontal_gap(left: &Word, right: &Word) -> i32 {
    (right.x_left - left.x_right).abs()
}

pub(super) fn vertical_span(a: Vertex, b: Vertex) -> i32 {
    (b.y - a.y).abs()
}

/// Window bounds saturate, so an oversized distance means "unbounded".
pub(super) fn within_kanji_band(word: &Word, kanji: &Word, thresholds: &Thresholds) -> bool {
    let top = kanji.y_top.saturating_sub(thresholds.max_distance_from_kanji_top);
    let bottom = kanji
        .y_bottom
        .saturating_add(thresholds.max_distance_from_kanji_bottom);
    word.y_top >= top && word.y_bottom <= bottom
}
