//! Integration tests for the stamping pipeline

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, ObjectId};
use pdf_core::Point;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use textrun::{
    optimized_path, run, ErrorPolicy, FontPaths, GridOptions, Scale, StampConfig, TextRunError,
    WorkingCopy,
};

/// A4 pages with empty content streams
fn create_test_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for _ in 0..page_count {
        let contents_id = doc.add_object(lopdf::Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(595.28),
                Object::Real(841.89),
            ],
            "Resources" => dictionary! {},
            "Contents" => contents_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_count as i64,
            "Kids" => page_ids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("Failed to write test PDF");
    buffer
}

fn text_run(left: Value, top: Value, font_weight: &str, text: &str) -> Value {
    json!({
        "left": left,
        "top": top,
        "text": [{
            "fontWeight": font_weight,
            "font_size": 12,
            "colorCode": "#ff0000",
            "transOrg": text
        }]
    })
}

fn page(texts: Vec<Value>) -> Value {
    json!({ "width": 595, "height": "842", "texts": texts })
}

/// Write the input PDF and JSON into a fresh directory
fn setup(page_count: usize, pages: Value) -> (TempDir, StampConfig) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("input.pdf");
    let json_path = dir.path().join("texts.json");
    std::fs::write(&input, create_test_pdf(page_count)).unwrap();
    std::fs::write(&json_path, serde_json::to_string(&pages).unwrap()).unwrap();

    let config = StampConfig::new(input, json_path, dir.path().join("output.pdf"));
    (dir, config)
}

fn load(path: &Path) -> Document {
    Document::load(path).expect("Failed to load output PDF")
}

fn page_id(doc: &Document, number: u32) -> ObjectId {
    *doc.get_pages().get(&number).expect("Missing page")
}

fn page_content(doc: &Document, number: u32) -> String {
    let content = doc
        .get_page_content(page_id(doc, number))
        .expect("Failed to read page content");
    String::from_utf8_lossy(&content).into_owned()
}

fn annotation_count(doc: &Document, number: u32) -> usize {
    let page = doc.get_dictionary(page_id(doc, number)).unwrap();
    match page.get(b"Annots") {
        Ok(Object::Array(annots)) => annots.len(),
        _ => 0,
    }
}

#[test]
fn test_end_to_end() {
    let pages = json!([{ "1": page(vec![text_run(json!("100"), json!(50), "bold", "Hi")]) }]);
    let (_dir, config) = setup(1, pages);

    let summary = run(&config).expect("Run failed");

    assert_eq!(summary.report.pages, 1);
    assert_eq!(summary.report.stamped, 1);
    assert_eq!(summary.report.skipped, 0);
    assert_eq!(summary.optimized, optimized_path(&config.output));
    assert!(summary.optimized.ends_with("output_opt.pdf"));

    let doc = load(&config.output);
    assert_eq!(doc.get_pages().len(), 1);
    let content = page_content(&doc, 1);
    assert!(content.contains("1 0 0 rg"));
    assert!(content.contains("/StampF1 12 Tf"));
    assert!(content.contains("(Hi) Tj"));
    // baseline: top + half leading + Helvetica ascent, flipped
    assert!(content.contains("100 782.07"), "{content}");

    // the source is left untouched
    let input = load(&config.input);
    assert_eq!(page_content(&input, 1), "");
}

#[test]
fn test_scale_moves_text() {
    let pages = json!([{ "1": page(vec![text_run(json!(50), json!(25), "", "Scaled")]) }]);
    let (_dir, mut config) = setup(1, pages);
    config.scale = Scale::new(2.0, 2.0);

    run(&config).expect("Run failed");

    let content = page_content(&load(&config.output), 1);
    assert!(content.contains("(Scaled) Tj"));
    assert!(content.contains("100 782.07"), "{content}");
}

#[test]
fn test_rerun_is_structurally_equivalent() {
    let pages = json!([
        { "1": page(vec![
            text_run(json!(72), json!(72), "bold underline", "First"),
            text_run(json!(72), json!(120), "superscript", "2"),
        ]) },
        { "2": page(vec![text_run(json!(10), json!(10), "", "Second page")]) }
    ]);
    let (dir, config) = setup(2, pages);

    run(&config).expect("First run failed");
    let first = load(&config.output);

    let mut again = config.clone();
    again.output = dir.path().join("again.pdf");
    run(&again).expect("Second run failed");
    let second = load(&again.output);

    assert_eq!(first.get_pages().len(), second.get_pages().len());
    for number in 1..=2 {
        assert_eq!(page_content(&first, number), page_content(&second, number));
    }
    assert!(page_content(&second, 2).contains("(Second page) Tj"));
}

#[test]
fn test_skip_policy_stamps_the_rest() {
    let malformed = json!({ "left": 10, "top": 10, "text": [{ "fontWeight": "" }] });
    let pages = json!([{ "1": page(vec![
        text_run(json!(10), json!(10), "", "Before"),
        malformed,
        text_run(json!(10), json!(100), "", "After"),
    ]) }]);
    let (_dir, config) = setup(1, pages);

    let summary = run(&config).expect("Run failed");

    assert_eq!(summary.report.stamped, 2);
    assert_eq!(summary.report.skipped, 1);
    let content = page_content(&load(&config.output), 1);
    assert!(content.contains("(Before) Tj"));
    assert!(content.contains("(After) Tj"));
}

#[test]
fn test_abort_policy_keeps_partial_output() {
    let malformed = json!({ "left": "nowhere", "top": 10, "text": [] });
    let pages = json!([{ "1": page(vec![
        text_run(json!(10), json!(10), "", "Before"),
        malformed.clone(),
        text_run(json!(10), json!(100), "", "After"),
    ]) }]);
    let (_dir, mut config) = setup(1, pages);
    config.policy = ErrorPolicy::Abort;

    match run(&config) {
        Err(TextRunError::MalformedRecord { record, .. }) => assert_eq!(record, malformed),
        other => panic!("expected a malformed record error, got {other:?}"),
    }

    // the working copy flushed what was stamped before the error
    let content = page_content(&load(&config.output), 1);
    assert!(content.contains("(Before) Tj"));
    assert!(!content.contains("(After) Tj"));
    assert!(!optimized_path(&config.output).exists());
}

#[test]
fn test_position_outside_page_is_skipped() {
    let pages = json!([{ "1": page(vec![
        text_run(json!(600), json!(10), "", "Off the page"),
        text_run(json!(10), json!(10), "", "On the page"),
    ]) }]);
    let (_dir, config) = setup(1, pages);

    let summary = run(&config).expect("Run failed");

    assert_eq!(summary.report.stamped, 1);
    assert_eq!(summary.report.skipped, 1);
}

#[test]
fn test_overflow_is_reported() {
    let pages = json!([{ "1": {
        "width": 595,
        "height": 60,
        "texts": [text_run(json!(10), json!(55), "", "Too tall")]
    } }]);
    let (_dir, config) = setup(1, pages);

    let summary = run(&config).expect("Run failed");

    assert_eq!(summary.report.stamped, 1);
    assert_eq!(summary.report.overflowed, 1);
    assert!(!page_content(&load(&config.output), 1).contains("(Too tall) Tj"));
}

#[test]
fn test_invalid_page_key_aborts() {
    for key in ["0", "2", "first"] {
        let pages = json!([{ key: page(vec![text_run(json!(10), json!(10), "", "x")]) }]);
        let (_dir, config) = setup(1, pages);

        match run(&config) {
            Err(TextRunError::InvalidPageKey { key: got, .. }) => assert_eq!(got, key),
            other => panic!("expected an invalid page key error for {key:?}, got {other:?}"),
        }
    }
}

#[test]
fn test_json_must_be_an_array() {
    let (_dir, config) = setup(1, json!({ "1": page(Vec::new()) }));

    assert!(matches!(run(&config), Err(TextRunError::Schema(_))));
    assert!(!config.output.exists());
}

#[test]
fn test_missing_input_file() {
    let (dir, mut config) = setup(1, json!([]));
    config.input = dir.path().join("missing.pdf");

    assert!(matches!(run(&config), Err(TextRunError::Io { .. })));
}

#[test]
fn test_output_may_not_overwrite_input() {
    let (_dir, mut config) = setup(1, json!([]));
    config.output = config.input.clone();

    assert!(matches!(run(&config), Err(TextRunError::Config(_))));
}

#[test]
fn test_grid_annotates_every_page() {
    let (_dir, mut config) = setup(2, json!([]));
    config.grid = Some(GridOptions::default());

    let summary = run(&config).expect("Run failed");

    // diagonal + 24 vertical (0..575) + 34 horizontal (0..825), per page
    assert_eq!(summary.grid_lines, 2 * 59);
    let doc = load(&config.output);
    for number in 1..=2 {
        assert_eq!(annotation_count(&doc, number), 59);
        let content = page_content(&doc, number);
        assert!(content.contains(" 5 Tf"));
        assert!(content.contains("(575.0) Tj"));
        assert!(content.contains("(825.0) Tj"));
    }
}

#[test]
fn test_optimized_output_opens() {
    let pages = json!([
        { "1": page(vec![text_run(json!(10), json!(10), "", "One")]) },
        { "3": page(vec![text_run(json!(10), json!(10), "", "Three")]) }
    ]);
    let (_dir, config) = setup(3, pages);

    let summary = run(&config).expect("Run failed");

    let optimized = load(&summary.optimized);
    assert_eq!(optimized.get_pages().len(), 3);
    let original_size = std::fs::metadata(&config.output).unwrap().len();
    let optimized_size = std::fs::metadata(&summary.optimized).unwrap().len();
    assert!(optimized_size <= original_size);
}

#[test]
fn test_working_copy_flushes_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("copy.pdf");
    std::fs::write(&path, create_test_pdf(1)).unwrap();

    {
        let mut copy = WorkingCopy::open(&path).unwrap();
        assert!(!copy.is_dirty());
        copy.document_mut()
            .insert_text(0, Point::new(72.0, 72.0), "Unsaved", &Default::default())
            .unwrap();
        assert!(copy.is_dirty());
    }

    assert!(page_content(&load(&path), 1).contains("(Unsaved) Tj"));
}

#[test]
fn test_working_copy_finish_saves_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("copy.pdf");
    std::fs::write(&path, create_test_pdf(1)).unwrap();

    let mut copy = WorkingCopy::open(&path).unwrap();
    copy.document_mut()
        .insert_text(0, Point::new(72.0, 72.0), "Final", &Default::default())
        .unwrap();
    let optimized = copy.finish().expect("Finish failed");

    assert_eq!(optimized, optimized_path(&path));
    let content = page_content(&load(&path), 1);
    assert_eq!(content.matches("(Final) Tj").count(), 1);
    assert_eq!(load(&optimized).get_pages().len(), 1);
}

#[test]
fn test_embedded_font_run() {
    let pages = json!([{ "1": page(vec![text_run(json!(10), json!(10), "superscript", "Embedded")]) }]);
    let (_dir, mut config) = setup(1, pages);
    config.fonts = Some(FontPaths::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../pdf-core/tests/fonts/DejaVuSansMono.ttf"
    )));

    let summary = run(&config).expect("Run failed");

    assert_eq!(summary.report.stamped, 1);
    assert_eq!(load(&summary.optimized).get_pages().len(), 1);
    let content = page_content(&load(&config.output), 1);
    assert!(content.contains(" Ts"));
    assert!(content.ends_with("ET\nQ\n"), "{content}");
}
