use anyhow::{Context, Result, anyhow};
use std::path::Path;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

pub(crate) const CJK_FALLBACK_FAMILIES: &[&str] = &[
    "Noto Sans CJK JP",
    "Noto Sans JP",
    "Hiragino Sans",
    "Hiragino Sans GB",
    "Yu Gothic",
    "MS Gothic",
    "IPAGothic",
    "Source Han Sans JP",
];

#[derive(Debug, Clone)]
pub struct ResolvedFont {
    pub family: String,
    pub data: Option<Vec<u8>>,
}

pub fn resolve_overlay_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font: {}", path.display()))?;
        let family = family_from_data(&data)
            .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))?
            .or_else(|| font_family.map(|name| name.to_string()))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedFont {
            family,
            data: Some(data),
        });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let requested = font_family.into_iter().chain(fallback.iter().copied());
    for candidate in requested {
        if has_family(&db, candidate) {
            return Ok(ResolvedFont {
                family: candidate.to_string(),
                data: None,
            });
        }
        tracing::debug!("font family not installed: {}", candidate);
    }

    tracing::warn!("no CJK font found; overlay text falls back to sans-serif");
    Ok(ResolvedFont {
        family: "sans-serif".to_string(),
        data: None,
    })
}

fn has_family(db: &fontdb::Database, family: &str) -> bool {
    let families = [fontdb::Family::Name(family)];
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    db.query(&query).is_some()
}

fn family_from_data(data: &[u8]) -> Result<Option<String>> {
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            return Ok(extract_family_name(&face));
        }
    }
    Err(anyhow!("no readable face in font data"))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
