use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::OverlayStyle;
use crate::words::Word;

/// Source image plus one unfilled box and one label per query. Labels sit on
/// the box's top edge, starting at its left corner.
pub fn render_overlay_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    queries: &[Word],
    style: &OverlayStyle,
) -> String {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for word in queries {
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="1"/>"#,
            x = word.x_left,
            y = word.y_top,
            w = word.width(),
            h = word.height(),
            stroke = escape_xml(&style.box_color)
        ));
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}">{text}</text>"#,
            x = word.x_left,
            y = word.y_top,
            size = style.font_size,
            color = escape_xml(&style.text_color),
            family = escape_xml(&style.font_family),
            text = escape_xml(&word.text)
        ));
    }

    svg.push_str("</svg>");
    svg
}

pub fn render_png(svg: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse overlay SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty overlay size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from overlay"))?;
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode overlay PNG")?;
    Ok(bytes)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
