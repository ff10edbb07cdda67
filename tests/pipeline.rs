use std::io::Cursor;
use std::path::{Path, PathBuf};

use kanji_vision_rust::output::read_queries;
use kanji_vision_rust::settings::{self, MergeOptions};
use kanji_vision_rust::{Config, QueryRecord, SavedResponse, WordKind, process_image};

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vision_response.json")
}

fn conf_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("conf.toml")
}

fn pairs(queries: &[kanji_vision_rust::Word]) -> Vec<(&str, WordKind)> {
    queries
        .iter()
        .map(|word| (word.text.as_str(), word.kind()))
        .collect()
}

fn write_page_image(path: &Path) {
    let page = image::RgbImage::from_pixel(400, 400, image::Rgb([255, 255, 255]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(page)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode page");
    std::fs::write(path, png).expect("write page");
}

#[tokio::test]
async fn saved_response_groups_vocab_under_kanji() {
    let settings = settings::load_settings(&conf_path()).expect("conf.toml");
    let detector = SavedResponse::new(fixture_path());
    let (_, queries) = process_image(&detector, &[], &settings)
        .await
        .expect("pipeline");

    assert_eq!(
        pairs(&queries),
        vec![
            ("漢", WordKind::Kanji),
            ("かんじ", WordKind::Vocab),
            ("字", WordKind::Kanji),
            ("かんじ", WordKind::Vocab),
            ("日", WordKind::Kanji),
            ("にち", WordKind::Vocab),
            ("ひ", WordKind::Vocab),
        ]
    );
    let merged = &queries[1];
    assert_eq!((merged.x_left, merged.x_right), (0, 50));
    assert_eq!((merged.y_top, merged.y_bottom), (55, 75));
}

#[tokio::test]
async fn dedupe_keeps_first_association_only() {
    let mut settings = settings::load_settings(&conf_path()).expect("conf.toml");
    settings.merge = MergeOptions {
        dedupe_vocab: true,
        ..settings.merge
    };
    let detector = SavedResponse::new(fixture_path());
    let (_, queries) = process_image(&detector, &[], &settings)
        .await
        .expect("pipeline");
    let texts: Vec<&str> = queries.iter().map(|word| word.text.as_str()).collect();
    assert_eq!(texts, vec!["漢", "かんじ", "字", "日", "にち", "ひ"]);
}

#[tokio::test]
async fn latin_only_page_reports_no_candidates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let response = dir.path().join("latin.json");
    std::fs::write(
        &response,
        r#"{"responses":[{"fullTextAnnotation":{"pages":[{"blocks":[{"paragraphs":[{"words":[
            {"boundingBox":{"vertices":[{},{"x":40},{"x":40,"y":20},{"y":20}]},
             "symbols":[{"text":"P"},{"text":"1"}],"confidence":0.99}
        ]}]}]}]}}]}"#,
    )
    .expect("write response");
    let settings = settings::load_settings(&conf_path()).expect("conf.toml");
    let err = process_image(&SavedResponse::new(response), &[], &settings)
        .await
        .expect_err("no candidates");
    assert!(err.to_string().contains("no candidate words"));
}

#[tokio::test]
async fn run_writes_yaml_overlay_and_dump() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("page.png");
    write_page_image(&image_path);
    let output_path = dir.path().join("words.yaml");
    let overlay_path = dir.path().join("overlay.png");
    let dump_path = dir.path().join("dump.json");

    let summary = kanji_vision_rust::run(Config {
        image_path,
        output_path: output_path.clone(),
        conf_path: conf_path(),
        key: None,
        response_path: Some(fixture_path()),
        dump_response_path: Some(dump_path.clone()),
        overlay_path: Some(overlay_path.clone()),
        display: false,
    })
    .await
    .expect("run");

    assert_eq!(summary.count(WordKind::Kanji), 3);
    assert_eq!(summary.count(WordKind::Vocab), 4);
    assert_eq!(summary.overlay_path.as_deref(), Some(overlay_path.as_path()));

    let yaml = std::fs::read_to_string(&output_path).expect("read yaml");
    insta::assert_snapshot!(yaml, @r"
    - string: 漢
      type: kanji
    - string: かんじ
      type: vocab
    - string: 字
      type: kanji
    - string: かんじ
      type: vocab
    - string: 日
      type: kanji
    - string: にち
      type: vocab
    - string: ひ
      type: vocab
    ");

    let records = read_queries(&output_path).expect("round trip");
    assert_eq!(records.len(), 7);
    assert_eq!(
        records[0],
        QueryRecord {
            string: "漢".to_string(),
            kind: WordKind::Kanji,
        }
    );

    let overlay = image::open(&overlay_path).expect("overlay png");
    assert_eq!((overlay.width(), overlay.height()), (400, 400));

    let dump = std::fs::read_to_string(&dump_path).expect("dump");
    assert_eq!(dump, std::fs::read_to_string(fixture_path()).expect("fixture"));
}

#[tokio::test]
async fn run_rejects_non_image_input_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("notes.txt");
    std::fs::write(&image_path, "not an image").expect("write");
    let output_path = dir.path().join("words.yaml");

    let err = kanji_vision_rust::run(Config {
        image_path,
        output_path: output_path.clone(),
        conf_path: conf_path(),
        key: None,
        response_path: Some(fixture_path()),
        dump_response_path: None,
        overlay_path: None,
        display: false,
    })
    .await
    .expect_err("non-image input");
    assert!(format!("{:#}", err).contains("unsupported input"));
    assert!(!output_path.exists());
}

#[tokio::test]
async fn viewer_failure_keeps_both_outputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("page.png");
    write_page_image(&image_path);
    let output_path = dir.path().join("words.yaml");
    let overlay_path = dir.path().join("overlay.png");
    let viewer = dir.path().join("no-such-viewer");
    let conf = std::fs::read_to_string(conf_path())
        .expect("conf.toml")
        .replace(
            "[display]\n",
            &format!("[display]\nviewer = '{}'\n", viewer.display()),
        );
    let custom_conf = dir.path().join("conf.toml");
    std::fs::write(&custom_conf, conf).expect("write conf");

    let summary = kanji_vision_rust::run(Config {
        image_path,
        output_path: output_path.clone(),
        conf_path: custom_conf,
        key: None,
        response_path: Some(fixture_path()),
        dump_response_path: None,
        overlay_path: Some(overlay_path.clone()),
        display: true,
    })
    .await
    .expect("viewer failure is not fatal");

    assert!(!summary.displayed);
    assert!(output_path.exists());
    assert!(overlay_path.exists());
}

#[tokio::test]
async fn dump_is_saved_when_no_candidates_remain() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("page.png");
    write_page_image(&image_path);
    let response = dir.path().join("latin.json");
    let body = r#"{"responses":[{"fullTextAnnotation":{"pages":[{"blocks":[{"paragraphs":[{"words":[
        {"boundingBox":{"vertices":[{},{"x":40},{"x":40,"y":20},{"y":20}]},
         "symbols":[{"text":"A"}],"confidence":0.99}
    ]}]}]}]}}]}"#;
    std::fs::write(&response, body).expect("write response");
    let output_path = dir.path().join("words.yaml");
    let overlay_path = dir.path().join("overlay.png");
    let dump_path = dir.path().join("dump.json");

    let err = kanji_vision_rust::run(Config {
        image_path,
        output_path: output_path.clone(),
        conf_path: conf_path(),
        key: None,
        response_path: Some(response),
        dump_response_path: Some(dump_path.clone()),
        overlay_path: Some(overlay_path.clone()),
        display: false,
    })
    .await
    .expect_err("no candidates");

    assert!(err.to_string().contains("no candidate words"));
    assert_eq!(std::fs::read_to_string(&dump_path).expect("dump"), body);
    assert!(!output_path.exists());
    assert!(!overlay_path.exists());
}

#[tokio::test]
async fn unwritable_output_removes_overlay() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("page.png");
    write_page_image(&image_path);
    let output_path = dir.path().join("missing-dir").join("words.yaml");
    let overlay_path = dir.path().join("overlay.png");

    kanji_vision_rust::run(Config {
        image_path,
        output_path: output_path.clone(),
        conf_path: conf_path(),
        key: None,
        response_path: Some(fixture_path()),
        dump_response_path: None,
        overlay_path: Some(overlay_path.clone()),
        display: false,
    })
    .await
    .expect_err("unwritable output");

    assert!(!output_path.exists());
    assert!(!overlay_path.exists());
}
