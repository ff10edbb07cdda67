mod extract;
mod geom;
mod merge;

use serde::{Deserialize, Serialize};

use crate::settings::VerticalExtent;

pub use extract::words_from_annotation;
pub use merge::{associate_kanji, build_queries, filter_latin, merge_fragments};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordKind {
    Kanji,
    Vocab,
}

/// A transcribed word and its axis-aligned box in image pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub y_top: i32,
    pub y_bottom: i32,
    pub x_left: i32,
    pub x_right: i32,
    pub is_kanji: bool,
}

impl Word {
    /// Builds a word, swapping edges that arrive out of order.
    pub fn new(
        text: impl Into<String>,
        (x_left, y_top): (i32, i32),
        (x_right, y_bottom): (i32, i32),
        is_kanji: bool,
    ) -> Self {
        Self {
            text: text.into(),
            y_top: y_top.min(y_bottom),
            y_bottom: y_top.max(y_bottom),
            x_left: x_left.min(x_right),
            x_right: x_left.max(x_right),
            is_kanji,
        }
    }

    pub fn height(&self) -> i32 {
        self.y_bottom - self.y_top
    }

    pub fn width(&self) -> i32 {
        self.x_right - self.x_left
    }

    pub fn kind(&self) -> WordKind {
        if self.is_kanji {
            WordKind::Kanji
        } else {
            WordKind::Vocab
        }
    }

    /// Appends `next` to the right of this word. The kanji flag is kept.
    pub fn merged_with(&self, next: &Word, extent: VerticalExtent) -> Word {
        let (y_top, y_bottom) = match extent {
            VerticalExtent::First => (self.y_top, self.y_bottom),
            VerticalExtent::Union => (
                self.y_top.min(next.y_top),
                self.y_bottom.max(next.y_bottom),
            ),
        };
        Word {
            text: format!("{}{}", self.text, next.text),
            y_top,
            y_bottom,
            x_left: self.x_left,
            x_right: next.x_right,
            is_kanji: self.is_kanji,
        }
    }
}
