mod font;
mod render;
mod viewer;

use anyhow::{Context, Result};
use image::GenericImageView;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::settings::DisplaySettings;
use crate::words::Word;

pub use font::{ResolvedFont, resolve_overlay_font};
pub use render::{render_overlay_svg, render_png};
pub use viewer::open_in_viewer;

pub struct OverlayStyle {
    pub font_size: f32,
    pub font_family: String,
    pub box_color: String,
    pub text_color: String,
}

/// Draws every query onto the source image and returns it as PNG bytes.
pub fn render_overlay(
    image_bytes: &[u8],
    queries: &[Word],
    display: &DisplaySettings,
) -> Result<Vec<u8>> {
    let image =
        image::load_from_memory(image_bytes).with_context(|| "failed to decode image for overlay")?;
    let (width, height) = image.dimensions();
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .with_context(|| "failed to re-encode image for overlay")?;

    let font = resolve_overlay_font(
        display.font_path.as_deref().map(Path::new),
        display.font_family.as_deref(),
        font::CJK_FALLBACK_FAMILIES,
    )?;
    let style = OverlayStyle {
        font_size: display.font_size,
        font_family: font.family,
        box_color: display.box_color.clone(),
        text_color: display.text_color.clone(),
    };
    let svg = render_overlay_svg(&png, "image/png", width, height, queries, &style);
    render_png(&svg, font.data.as_deref())
}

/// Writes the overlay to `target`, or to a kept temp file when no target is
/// given, and returns the path written.
pub fn write_overlay(png: &[u8], target: Option<&Path>) -> Result<PathBuf> {
    let path = match target {
        Some(path) => path.to_path_buf(),
        None => {
            let (_, path) = tempfile::Builder::new()
                .prefix("kanji-overlay-")
                .suffix(".png")
                .tempfile()
                .with_context(|| "failed to create overlay temp file")?
                .keep()
                .with_context(|| "failed to keep overlay temp file")?;
            path
        }
    };
    std::fs::write(&path, png)
        .with_context(|| format!("failed to write overlay: {}", path.display()))?;
    info!("overlay written to {}", path.display());
    Ok(path)
}
