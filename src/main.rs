use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use kanji_vision_rust::WordKind;

#[derive(Parser, Debug)]
#[command(
    name = "kanji-vision-rust",
    version,
    about = "Read kanji and Japanese vocabulary words from an image using Google Cloud Vision"
)]
struct Cli {
    /// Input image
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Output YAML file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Configuration file
    #[arg(
        short = 'c',
        long = "conf",
        default_value = kanji_vision_rust::settings::DEFAULT_CONF_PATH
    )]
    conf: PathBuf,

    /// Cloud Vision API key (overrides GOOGLE_CLOUD_VISION_API_KEY / GOOGLE_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Use a saved images:annotate JSON response instead of calling the service
    #[arg(long = "response")]
    response: Option<PathBuf>,

    /// Save the raw images:annotate JSON response
    #[arg(long = "dump-response")]
    dump_response: Option<PathBuf>,

    /// Write the annotated overlay image to this path
    #[arg(long = "overlay")]
    overlay: Option<PathBuf>,

    /// Do not open the annotated image
    #[arg(long = "no-display")]
    no_display: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    kanji_vision_rust::logging::init(cli.verbose)?;

    let output = cli.output.clone();
    let summary = kanji_vision_rust::run(kanji_vision_rust::Config {
        image_path: cli.image,
        output_path: cli.output,
        conf_path: cli.conf,
        key: cli.key,
        response_path: cli.response,
        dump_response_path: cli.dump_response,
        overlay_path: cli.overlay,
        display: !cli.no_display,
    })
    .await?;

    println!(
        "{}: {} kanji, {} vocab",
        output.display(),
        summary.count(WordKind::Kanji),
        summary.count(WordKind::Vocab)
    );
    if let Some(path) = summary.overlay_path {
        println!("overlay: {}", path.display());
    }
    Ok(())
}
