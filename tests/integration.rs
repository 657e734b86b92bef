//! Integration tests for the form export fixer

use form_export_fixer::export_log::{ExportLog, LOG_FILE_NAME};
use form_export_fixer::manifest::MANIFEST_FILE_NAME;
use form_export_fixer::pdf::append_pdf;
use form_export_fixer::pipeline::{process_plan, run, RunConfig};
use form_export_fixer::xref::XrefPlan;
use form_export_fixer::Error;
use lopdf::{Dictionary, Document, Object};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Page width used to tell source pages from appended pages
const SOURCE_WIDTH: i64 = 612;
const APPEND_WIDTH: i64 = 595;

/// Write a PDF with `pages` empty pages of the given width
fn write_pdf(path: &Path, pages: usize, width: i64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create fixture folder");
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for index in 0..pages {
        let content_id = doc.add_object(lopdf::Stream::new(
            Dictionary::new(),
            format!("% page {}\n", index + 1).into_bytes(),
        ));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(792),
            ]),
        );
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(pages as i64));
    pages_dict.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc.save(path).expect("Failed to write fixture PDF");
}

/// MediaBox width of every page, in page order
fn page_widths(path: &Path) -> Vec<i64> {
    let doc = Document::load(path).expect("Failed to load PDF");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).expect("Page is not a dictionary");
            let media_box = page
                .get(b"MediaBox")
                .and_then(Object::as_array)
                .expect("Page has no MediaBox");
            media_box[2].as_i64().expect("MediaBox width is not an integer")
        })
        .collect()
}

fn write_manifest(dir: &Path, rows: &[&str]) {
    fs::create_dir_all(dir).expect("Failed to create batch folder");
    let mut contents = String::from("UserId,LastName,FormName\n");
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    fs::write(dir.join(MANIFEST_FILE_NAME), contents).expect("Failed to write manifest");
}

fn xref_row(user_id: &str, last_name: &str, form_name: &str, append: &Path) -> String {
    format!(
        ",{},,{},,,,,,{},,{}\n",
        user_id,
        last_name,
        form_name,
        append.display()
    )
}

struct Workspace {
    _temp: TempDir,
    input: PathBuf,
    output: PathBuf,
    attachments: PathBuf,
    work_dir: PathBuf,
    xref: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let input = temp.path().join("input");
        let output = temp.path().join("output");
        let attachments = temp.path().join("attachments");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();
        fs::create_dir_all(&attachments).unwrap();
        Self {
            work_dir: temp.path().join("work"),
            xref: temp.path().join("xref.csv"),
            _temp: temp,
            input,
            output,
            attachments,
        }
    }

    fn write_xref(&self, rows: &[String]) {
        let mut contents = String::from("Id,UserId,x,LastName,x,x,x,x,x,FormName,x,AppendFile\n");
        for row in rows {
            contents.push_str(row);
        }
        fs::write(&self.xref, contents).expect("Failed to write xref");
    }

    fn config(&self) -> RunConfig {
        RunConfig::new(&self.input, &self.output, &self.xref).with_work_dir(&self.work_dir)
    }

    fn log_lines(&self) -> Vec<String> {
        fs::read_to_string(self.output.join(LOG_FILE_NAME))
            .expect("Log file was not written")
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[test]
fn test_append_pdf_page_order() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let source = temp.path().join("source.pdf");
    let append = temp.path().join("append.pdf");
    let output = temp.path().join("combined.pdf");
    write_pdf(&source, 2, SOURCE_WIDTH);
    write_pdf(&append, 3, APPEND_WIDTH);

    let stats = append_pdf(&source, &append, &output).expect("Failed to append PDFs");

    assert_eq!(stats.source_pages, 2);
    assert_eq!(stats.appended_pages, 3);
    assert_eq!(
        page_widths(&output),
        vec![SOURCE_WIDTH, SOURCE_WIDTH, APPEND_WIDTH, APPEND_WIDTH, APPEND_WIDTH]
    );
    assert_eq!(page_widths(&source).len(), 2, "Source must not be modified");
}

#[test]
fn test_append_rejects_non_pdf() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let source = temp.path().join("source.pdf");
    let append = temp.path().join("append.pdf");
    write_pdf(&source, 1, SOURCE_WIDTH);
    fs::write(&append, "not a pdf").unwrap();

    let result = append_pdf(&source, &append, &temp.path().join("out.pdf"));
    assert!(result.is_err(), "Should fail on malformed PDF");
}

#[test]
fn test_end_to_end_scenario() {
    let ws = Workspace::new();
    write_manifest(&ws.input.join("batch1"), &["U1,Smith,FormA", "U2,Jones,FormB"]);
    write_manifest(&ws.input.join("batch2"), &["U3,Brown,FormC", "U4,Green,FormD"]);

    let source = ws.output.join("U1_Smith").join("U1_Smith_FormA.pdf");
    let append = ws.attachments.join("append.pdf");
    write_pdf(&source, 1, SOURCE_WIDTH);
    write_pdf(&append, 2, APPEND_WIDTH);
    ws.write_xref(&[xref_row("U1", "Smith", "Form A", &append)]);

    let summary = run(&ws.config()).expect("Run failed");

    let manifest = fs::read_to_string(ws.output.join(MANIFEST_FILE_NAME)).unwrap();
    let lines: Vec<&str> = manifest.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "UserId,LastName,FormName");
    assert_eq!(lines.iter().filter(|l| l.starts_with("UserId")).count(), 1);
    assert_eq!(summary.manifest_files, 2);
    assert_eq!(summary.manifest_lines, Some(5));

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(page_widths(&source), vec![SOURCE_WIDTH, APPEND_WIDTH, APPEND_WIDTH]);

    let log = ws.log_lines();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], "FileName,FilePath,Message");
    assert!(log[1].starts_with("U1_Smith_FormA.pdf,"));
    assert!(log[1].ends_with(",Complete"));

    assert!(!ws.work_dir.exists(), "Work directory should be removed");
}

#[test]
fn test_failed_task_does_not_stop_run() {
    let ws = Workspace::new();

    let good_source = ws.output.join("U2_Jones").join("U2_Jones_FormB.pdf");
    let good_append = ws.attachments.join("b.pdf");
    write_pdf(&good_source, 1, SOURCE_WIDTH);
    write_pdf(&good_append, 1, APPEND_WIDTH);

    let missing_append = ws.attachments.join("a.pdf");
    let untouched_source = ws.output.join("U1_Smith").join("U1_Smith_FormA.pdf");
    write_pdf(&untouched_source, 1, SOURCE_WIDTH);

    ws.write_xref(&[
        xref_row("U1", "Smith", "Form A", &missing_append),
        xref_row("U2", "Jones", "Form B", &good_append),
    ]);

    let summary = run(&ws.config()).expect("Run failed");

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(page_widths(&good_source), vec![SOURCE_WIDTH, APPEND_WIDTH]);
    assert_eq!(page_widths(&untouched_source), vec![SOURCE_WIDTH]);

    let log = ws.log_lines();
    assert_eq!(log.len(), 3);
    let failure = log
        .iter()
        .find(|line| line.starts_with("U1_Smith_FormA.pdf,"))
        .expect("Failed task was not logged");
    assert!(failure.contains("File not found"), "Unexpected message: {}", failure);
    assert!(failure.contains("a.pdf"));
}

#[test]
fn test_leftover_work_file_fails_cleanup() {
    let ws = Workspace::new();
    let source = ws.output.join("U1_Smith").join("U1_Smith_FormA.pdf");
    let append = ws.attachments.join("append.pdf");
    write_pdf(&source, 1, SOURCE_WIDTH);
    write_pdf(&append, 1, APPEND_WIDTH);
    ws.write_xref(&[xref_row("U1", "Smith", "Form A", &append)]);

    fs::create_dir_all(&ws.work_dir).unwrap();
    fs::write(ws.work_dir.join("stale.pdf"), "left over").unwrap();

    let result = run(&ws.config());

    match result {
        Err(Error::IoAt { path, .. }) => assert_eq!(path, ws.work_dir),
        other => panic!("Expected cleanup to fail on the work directory, got {:?}", other),
    }

    // The task itself still ran and was logged before cleanup failed
    assert_eq!(page_widths(&source), vec![SOURCE_WIDTH, APPEND_WIDTH]);
    assert_eq!(ws.log_lines().len(), 2);
    assert!(ws.work_dir.join("stale.pdf").exists());
}

#[test]
fn test_malformed_row_is_skipped() {
    let ws = Workspace::new();
    let source = ws.output.join("U2_Jones").join("U2_Jones_FormB.pdf");
    let append = ws.attachments.join("b.pdf");
    write_pdf(&source, 1, SOURCE_WIDTH);
    write_pdf(&append, 1, APPEND_WIDTH);

    ws.write_xref(&[
        ",U1,,Smith,too,short\n".to_string(),
        xref_row("U2", "Jones", "Form B", &append),
    ]);

    let summary = run(&ws.config()).expect("Run failed");

    assert_eq!(summary.rejected_rows, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(ws.log_lines().len(), 2);
}

#[test]
fn test_second_run_keeps_combined_manifest() {
    let ws = Workspace::new();
    write_manifest(&ws.input.join("batch1"), &["U1,Smith,FormA"]);
    ws.write_xref(&[]);

    run(&ws.config()).expect("First run failed");
    write_manifest(&ws.input.join("batch2"), &["U9,Late,FormZ"]);
    let summary = run(&ws.config()).expect("Second run failed");

    assert_eq!(summary.manifest_lines, None);
    let manifest = fs::read_to_string(ws.output.join(MANIFEST_FILE_NAME)).unwrap();
    assert!(!manifest.contains("U9"));
}

#[test]
fn test_process_plan_runs_each_task_once() {
    let ws = Workspace::new();
    let mut plan = XrefPlan::default();

    for (user, width) in [("U1", 100), ("U2", 200)] {
        let source = ws.output.join(format!("{}.pdf", user));
        let append = ws.attachments.join(format!("{}-extra.pdf", user));
        write_pdf(&source, 1, SOURCE_WIDTH);
        write_pdf(&append, 1, width);
        plan.insert(append, source);
    }

    let (completed, failed) = process_plan(&ws.config(), &plan).expect("Processing failed");

    assert_eq!((completed, failed), (2, 0));
    assert_eq!(page_widths(&ws.output.join("U1.pdf")), vec![SOURCE_WIDTH, 100]);
    assert_eq!(page_widths(&ws.output.join("U2.pdf")), vec![SOURCE_WIDTH, 200]);

    let log = ExportLog::in_folder(&ws.output);
    let contents = fs::read_to_string(log.path()).unwrap();
    assert_eq!(contents.matches("Complete").count(), 2);
}
