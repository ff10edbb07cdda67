use anyhow::{Result, anyhow};
use tracing::debug;

use crate::settings::{MergeOptions, Thresholds, VerticalExtent};

use super::Word;
use super::geom::{horizontal_gap, within_kanji_band};

/// Drops words that start with an ASCII letter, digit, `/` or `-`.
/// Only the leading character is inspected.
pub fn filter_latin(words: Vec<Word>) -> Vec<Word> {
    words
        .into_iter()
        .filter(|word| {
            let latin = word
                .text
                .chars()
                .next()
                .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '/' || ch == '-');
            if latin {
                debug!("dropping latin/numeric word '{}'", word.text);
            }
            !latin
        })
        .collect()
}

/// Fuses runs of horizontally adjacent non-kanji fragments. Kanji pass
/// through untouched and never join a run.
pub fn merge_fragments(
    words: Vec<Word>,
    thresholds: &Thresholds,
    extent: VerticalExtent,
) -> Vec<Word> {
    let mut merged = Vec::with_capacity(words.len());
    let mut buffer: Option<Word> = None;

    for pair in words.windows(2) {
        let [current, next] = pair else {
            continue;
        };
        if current.is_kanji {
            merged.push(current.clone());
            buffer = None;
            continue;
        }
        let run = buffer.take().unwrap_or_else(|| current.clone());
        if !next.is_kanji && horizontal_gap(current, next) <= thresholds.min_interword_distance {
            buffer = Some(run.merged_with(next, extent));
        } else {
            merged.push(run);
        }
    }

    match buffer {
        Some(run) => merged.push(run),
        None => {
            if let Some(last) = words.last() {
                merged.push(last.clone());
            }
        }
    }
    merged
}

/// Emits each kanji followed by every vocabulary word inside its vertical
/// window, in list order. With `dedupe`, a word is only emitted under the
/// first kanji that claims it.
pub fn associate_kanji(words: &[Word], thresholds: &Thresholds, dedupe: bool) -> Vec<Word> {
    let mut queries = Vec::new();
    let mut claimed = vec![false; words.len()];

    for kanji in words.iter().filter(|word| word.is_kanji) {
        queries.push(kanji.clone());
        for (idx, word) in words.iter().enumerate() {
            if word.is_kanji || !within_kanji_band(word, kanji, thresholds) {
                continue;
            }
            if dedupe && claimed[idx] {
                continue;
            }
            claimed[idx] = true;
            queries.push(word.clone());
        }
    }
    queries
}

pub fn build_queries(
    words: Vec<Word>,
    thresholds: &Thresholds,
    options: &MergeOptions,
) -> Result<Vec<Word>> {
    let filtered = filter_latin(words);
    if filtered.is_empty() {
        return Err(anyhow!(
            "no candidate words: every detected word was filtered out"
        ));
    }
    let merged = merge_fragments(filtered, thresholds, options.vertical_extent);
    debug!("merged into {} words", merged.len());
    let queries = associate_kanji(&merged, thresholds, options.dedupe_vocab);
    debug!("{} queries after kanji association", queries.len());
    Ok(queries)
}
