use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONF_PATH: &str = "conf.toml";
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Pixel and confidence thresholds shared by every stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub min_confidence: f32,
    pub min_word_height: i32,
    pub min_kanji_height: i32,
    pub min_interword_distance: i32,
    pub max_distance_from_kanji_top: i32,
    pub max_distance_from_kanji_bottom: i32,
}

/// How a merged word's vertical extent is derived from its fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalExtent {
    /// Keep the first fragment's top and bottom.
    #[default]
    First,
    /// Span every fragment.
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    pub dedupe_vocab: bool,
    pub vertical_extent: VerticalExtent,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub font_size: f32,
    pub font_family: Option<String>,
    pub font_path: Option<String>,
    pub box_color: String,
    pub text_color: String,
    /// Program used instead of the platform default to open the overlay.
    pub viewer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VisionSettings {
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub language_hints: Vec<String>,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 1,
            language_hints: vec!["ja".to_string(), "en".to_string(), "ko".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub thresholds: Thresholds,
    pub merge: MergeOptions,
    pub display: DisplaySettings,
    pub vision: VisionSettings,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    min_confidence: Option<f32>,
    min_word_height: Option<i32>,
    min_kanji_height: Option<i32>,
    min_interword_distance: Option<i32>,
    max_distance_from_kanji_top: Option<i32>,
    max_distance_from_kanji_bottom: Option<i32>,
    display_font_size: Option<u32>,
    dedupe_vocab: Option<bool>,
    merged_vertical_extent: Option<VerticalExtent>,
    display: Option<DisplayFile>,
    vision: Option<VisionFile>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplayFile {
    font_family: Option<String>,
    font_path: Option<String>,
    box_color: Option<String>,
    text_color: Option<String>,
    viewer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VisionFile {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<usize>,
    language_hints: Option<Vec<String>>,
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(anyhow!("settings file not found: {}", path.display()));
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings: {}", path.display()))?;
    parse_settings(&content).with_context(|| format!("invalid settings: {}", path.display()))
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    let parsed: SettingsFile =
        toml::from_str(content).with_context(|| "failed to parse settings TOML")?;
    Settings::from_file(parsed)
}

impl Settings {
    fn from_file(file: SettingsFile) -> Result<Self> {
        let thresholds = Thresholds {
            min_confidence: required(file.min_confidence, "min_confidence")?,
            min_word_height: required(file.min_word_height, "min_word_height")?,
            min_kanji_height: required(file.min_kanji_height, "min_kanji_height")?,
            min_interword_distance: required(
                file.min_interword_distance,
                "min_interword_distance",
            )?,
            max_distance_from_kanji_top: required(
                file.max_distance_from_kanji_top,
                "max_distance_from_kanji_top",
            )?,
            max_distance_from_kanji_bottom: required(
                file.max_distance_from_kanji_bottom,
                "max_distance_from_kanji_bottom",
            )?,
        };
        validate_thresholds(&thresholds)?;

        let font_size = required(file.display_font_size, "display_font_size")?;
        if font_size == 0 {
            return Err(anyhow!("display_font_size must be greater than 0"));
        }

        let merge = MergeOptions {
            dedupe_vocab: file.dedupe_vocab.unwrap_or(false),
            vertical_extent: file.merged_vertical_extent.unwrap_or_default(),
        };

        let mut display = DisplaySettings {
            font_size: font_size as f32,
            font_family: None,
            font_path: None,
            box_color: "#0000ff".to_string(),
            text_color: "#ff0000".to_string(),
            viewer: None,
        };
        if let Some(incoming) = file.display {
            if let Some(family) = non_empty(incoming.font_family) {
                display.font_family = Some(family);
            }
            if let Some(path) = non_empty(incoming.font_path) {
                display.font_path = Some(path);
            }
            if let Some(color) = non_empty(incoming.box_color) {
                display.box_color = color;
            }
            if let Some(color) = non_empty(incoming.text_color) {
                display.text_color = color;
            }
            if let Some(viewer) = non_empty(incoming.viewer) {
                display.viewer = Some(viewer);
            }
        }

        let mut vision = VisionSettings::default();
        if let Some(incoming) = file.vision {
            if let Some(endpoint) = non_empty(incoming.endpoint) {
                vision.endpoint = endpoint;
            }
            if let Some(secs) = incoming.timeout_secs {
                if secs == 0 {
                    return Err(anyhow!("vision.timeout_secs must be greater than 0"));
                }
                vision.timeout = Duration::from_secs(secs);
            }
            if let Some(retries) = incoming.max_retries {
                vision.max_retries = retries;
            }
            if let Some(hints) = incoming.language_hints {
                vision.language_hints = hints
                    .into_iter()
                    .map(|hint| hint.trim().to_string())
                    .filter(|hint| !hint.is_empty())
                    .collect();
            }
        }

        Ok(Self {
            thresholds,
            merge,
            display,
            vision,
        })
    }
}

fn validate_thresholds(thresholds: &Thresholds) -> Result<()> {
    if !(0.0..=1.0).contains(&thresholds.min_confidence) {
        return Err(anyhow!(
            "min_confidence must be between 0 and 1 (got {})",
            thresholds.min_confidence
        ));
    }
    for (key, value) in [
        ("min_word_height", thresholds.min_word_height),
        ("min_kanji_height", thresholds.min_kanji_height),
        ("min_interword_distance", thresholds.min_interword_distance),
        (
            "max_distance_from_kanji_top",
            thresholds.max_distance_from_kanji_top,
        ),
        (
            "max_distance_from_kanji_bottom",
            thresholds.max_distance_from_kanji_bottom,
        ),
    ] {
        if value < 0 {
            return Err(anyhow!("{} must not be negative (got {})", key, value));
        }
    }
    if thresholds.min_kanji_height <= thresholds.min_word_height {
        return Err(anyhow!(
            "min_kanji_height ({}) must be greater than min_word_height ({})",
            thresholds.min_kanji_height,
            thresholds.min_word_height
        ));
    }
    Ok(())
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| anyhow!("missing required setting '{}'", key))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BASE: &str = r#"
min_confidence = 0.8
min_word_height = 10
min_kanji_height = 40
min_interword_distance = 15
max_distance_from_kanji_top = 20
max_distance_from_kanji_bottom = 60
display_font_size = 24
"#;

    #[test]
    fn parses_required_keys_with_defaults() {
        let settings = parse_settings(BASE).expect("settings");
        assert_eq!(settings.thresholds.min_kanji_height, 40);
        assert_eq!(settings.thresholds.max_distance_from_kanji_bottom, 60);
        assert_eq!(settings.display.font_size, 24.0);
        assert!(!settings.merge.dedupe_vocab);
        assert_eq!(settings.merge.vertical_extent, VerticalExtent::First);
        assert_eq!(settings.vision.endpoint, DEFAULT_VISION_ENDPOINT);
        assert_eq!(settings.vision.language_hints, vec!["ja", "en", "ko"]);
        assert_eq!(settings.vision.max_retries, 1);
        assert!(settings.display.viewer.is_none());
    }

    #[test]
    fn parses_optional_tables() {
        let extra = r##"
dedupe_vocab = true
merged_vertical_extent = "union"

[display]
font_family = "Noto Sans CJK JP"
box_color = "#00ff00"
viewer = "feh"

[vision]
timeout_secs = 5
max_retries = 3
language_hints = ["ja", " "]
"##;
        let content = format!("{}{}", BASE, extra);
        let settings = parse_settings(&content).expect("settings");
        assert!(settings.merge.dedupe_vocab);
        assert_eq!(settings.merge.vertical_extent, VerticalExtent::Union);
        assert_eq!(
            settings.display.font_family.as_deref(),
            Some("Noto Sans CJK JP")
        );
        assert_eq!(settings.display.box_color, "#00ff00");
        assert_eq!(settings.display.text_color, "#ff0000");
        assert_eq!(settings.display.viewer.as_deref(), Some("feh"));
        assert_eq!(settings.vision.timeout, Duration::from_secs(5));
        assert_eq!(settings.vision.max_retries, 3);
        assert_eq!(settings.vision.language_hints, vec!["ja"]);
    }

    #[test]
    fn missing_key_is_named() {
        let content = BASE.replace("min_interword_distance = 15\n", "");
        let err = parse_settings(&content).expect_err("missing key");
        assert!(err.to_string().contains("min_interword_distance"));
    }

    #[test]
    fn rejects_kanji_height_not_above_word_height() {
        let content = BASE.replace("min_kanji_height = 40", "min_kanji_height = 10");
        let err = parse_settings(&content).expect_err("invalid heights");
        assert!(err.to_string().contains("min_kanji_height"));
    }

    #[test]
    fn accepts_maximal_kanji_distances() {
        let content = BASE
            .replace(
                "max_distance_from_kanji_top = 20",
                "max_distance_from_kanji_top = 2147483647",
            )
            .replace(
                "max_distance_from_kanji_bottom = 60",
                "max_distance_from_kanji_bottom = 2147483647",
            );
        let settings = parse_settings(&content).expect("settings");
        assert_eq!(settings.thresholds.max_distance_from_kanji_bottom, i32::MAX);
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let content = BASE.replace("min_confidence = 0.8", "min_confidence = 1.5");
        assert!(parse_settings(&content).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().expect("tempdir");
        let err = load_settings(&dir.path().join("conf.toml")).expect_err("missing file");
        assert!(err.to_string().contains("settings file not found"));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("conf.toml");
        fs::write(&path, BASE).expect("write conf");
        let settings = load_settings(&path).expect("settings");
        assert_eq!(settings.thresholds.min_word_height, 10);
    }

    #[test]
    fn bundled_conf_parses() {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/conf.toml"));
        parse_settings(content).expect("bundled conf.toml");
    }
}
