use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use tracing::{info, warn};

pub mod logging;
pub mod output;
pub mod overlay;
pub mod settings;
pub mod vision;
pub mod words;

pub use output::QueryRecord;
pub use settings::Settings;
pub use vision::{SavedResponse, TextDetector, VisionClient};
pub use words::{Word, WordKind};

#[derive(Debug, Clone)]
pub struct Config {
    pub image_path: PathBuf,
    pub output_path: PathBuf,
    pub conf_path: PathBuf,
    pub key: Option<String>,
    pub response_path: Option<PathBuf>,
    pub dump_response_path: Option<PathBuf>,
    pub overlay_path: Option<PathBuf>,
    pub display: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub queries: Vec<Word>,
    pub overlay_path: Option<PathBuf>,
    /// Whether the overlay was handed to an image viewer.
    pub displayed: bool,
}

impl RunSummary {
    pub fn count(&self, kind: WordKind) -> usize {
        self.queries
            .iter()
            .filter(|word| word.kind() == kind)
            .count()
    }
}

pub async fn run(config: Config) -> Result<RunSummary> {
    let settings = settings::load_settings(&config.conf_path)?;
    let image_bytes = std::fs::read(&config.image_path)
        .with_context(|| format!("failed to read image: {}", config.image_path.display()))?;
    let mime = sniff_image_mime(&image_bytes)
        .with_context(|| format!("unsupported input: {}", config.image_path.display()))?;
    info!(
        "read {} ({}, {} bytes)",
        config.image_path.display(),
        mime,
        image_bytes.len()
    );

    let detector: Box<dyn TextDetector> = match config.response_path.as_deref() {
        Some(path) => Box::new(SavedResponse::new(path)),
        None => {
            let key = vision::resolve_key(config.key.as_deref())?;
            Box::new(VisionClient::new(key, settings.vision.clone())?)
        }
    };
    let detection = detector.detect_document_text(&image_bytes).await?;
    // Dumped before the word pipeline, which may still fail.
    if let Some(path) = config.dump_response_path.as_deref() {
        vision::save_raw_response(path, &detection.raw)?;
    }
    let queries = queries_from_annotation(&detection.annotation, &settings)?;

    let wants_overlay = config.display || config.overlay_path.is_some();
    let overlay_path = if wants_overlay {
        let png = overlay::render_overlay(&image_bytes, &queries, &settings.display)?;
        Some(overlay::write_overlay(&png, config.overlay_path.as_deref())?)
    } else {
        None
    };

    if let Err(err) = output::write_queries(&config.output_path, &queries) {
        if let Some(path) = overlay_path.as_deref()
            && let Err(cleanup) = std::fs::remove_file(path)
        {
            warn!("failed to remove overlay {}: {}", path.display(), cleanup);
        }
        return Err(err);
    }
    info!(
        "wrote {} queries to {}",
        queries.len(),
        config.output_path.display()
    );

    let mut displayed = false;
    if config.display
        && let Some(path) = overlay_path.as_deref()
    {
        match overlay::open_in_viewer(path, settings.display.viewer.as_deref()) {
            Ok(()) => displayed = true,
            Err(err) => warn!("{:#}", err),
        }
    }

    Ok(RunSummary {
        queries,
        overlay_path,
        displayed,
    })
}

/// Runs detection and the word pipeline, returning the raw service body with
/// the final query list.
pub async fn process_image<D: TextDetector + ?Sized>(
    detector: &D,
    image_bytes: &[u8],
    settings: &Settings,
) -> Result<(String, Vec<Word>)> {
    let detection = detector.detect_document_text(image_bytes).await?;
    let queries = queries_from_annotation(&detection.annotation, settings)?;
    Ok((detection.raw, queries))
}

fn queries_from_annotation(
    annotation: &vision::TextAnnotation,
    settings: &Settings,
) -> Result<Vec<Word>> {
    let raw_words = words::words_from_annotation(annotation, &settings.thresholds);
    info!("extracted {} words", raw_words.len());
    words::build_queries(raw_words, &settings.thresholds, &settings.merge)
}

pub fn sniff_image_mime(bytes: &[u8]) -> Result<&'static str> {
    let kind = infer::get(bytes).ok_or_else(|| anyhow!("could not detect file type"))?;
    let mime = kind.mime_type();
    if !mime.starts_with("image/") {
        return Err(anyhow!("expected an image, found {}", mime));
    }
    Ok(mime)
}
