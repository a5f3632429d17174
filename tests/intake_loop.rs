mod common;

use common::{ann, test_config, write_blank_pdf, QueueAnnotator};
use pdf_annotator::{
    document::LopdfStore,
    intake::{scan, Intake},
    pipeline::Pipeline,
    report::FileStatus,
};

#[test]
fn scan_matches_pattern_and_skips_directories() {
    let input = tempfile::tempdir().unwrap();
    write_blank_pdf(&input.path().join("b.pdf"));
    write_blank_pdf(&input.path().join("a.pdf"));
    std::fs::write(input.path().join("notes.txt"), b"x").unwrap();
    std::fs::create_dir(input.path().join("folder.pdf")).unwrap();

    let cfg = test_config(input.path(), input.path(), false);
    let files = scan(&cfg).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);
}

#[test]
fn glob_characters_in_directory_are_literal() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("in[1]");
    std::fs::create_dir(&input).unwrap();
    write_blank_pdf(&input.join("a.pdf"));

    let cfg = test_config(&input, root.path(), false);
    assert_eq!(scan(&cfg).unwrap().len(), 1);
}

#[test]
fn one_failure_does_not_stop_the_pass() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for name in ["1.pdf", "2.pdf", "3.pdf"] {
        write_blank_pdf(&input.path().join(name));
    }

    let cfg = test_config(input.path(), output.path(), false);
    let annotator = QueueAnnotator::new(vec![
        Ok(ann("s1", "k1", "t1", "one.pdf")),
        Err("quota exceeded".into()),
        Ok(ann("s3", "k3", "t3", "three.pdf")),
    ]);
    let pipeline = Pipeline::new(&cfg, "", annotator, LopdfStore::new(&cfg)).unwrap();
    let intake = Intake::new(&cfg, pipeline);

    let summary = intake.poll_once();
    assert_eq!(summary.scanned, 3);
    let statuses: Vec<_> = summary.files.iter().map(|f| f.status).collect();
    assert_eq!(
        statuses,
        vec![FileStatus::Relocated, FileStatus::Failed, FileStatus::Relocated]
    );
    assert!(summary.files[1].detail.as_deref().unwrap().contains("quota exceeded"));

    assert!(!input.path().join("1.pdf").exists());
    assert!(input.path().join("2.pdf").exists());
    assert!(!input.path().join("3.pdf").exists());
    assert!(output.path().join("one.pdf").exists());
    assert!(output.path().join("three.pdf").exists());
}

#[test]
fn failed_file_is_retried_on_the_next_pass() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_blank_pdf(&input.path().join("scan.pdf"));

    let cfg = test_config(input.path(), output.path(), false);
    let annotator = QueueAnnotator::new(vec![
        Err("network down".into()),
        Ok(ann("s", "k", "t", "20240101_Doc.pdf")),
    ]);
    let calls = annotator.calls.clone();
    let pipeline = Pipeline::new(&cfg, "", annotator, LopdfStore::new(&cfg)).unwrap();
    let intake = Intake::new(&cfg, pipeline);

    let first = intake.poll_once();
    assert_eq!(first.count(FileStatus::Failed), 1);
    assert!(input.path().join("scan.pdf").exists());

    let second = intake.poll_once();
    assert_eq!(second.count(FileStatus::Relocated), 1);
    assert!(!input.path().join("scan.pdf").exists());
    assert!(output.path().join("20240101_Doc.pdf").exists());

    let third = intake.poll_once();
    assert_eq!(third.scanned, 0);
    assert_eq!(*calls.borrow(), 2);
}

#[test]
fn rejected_file_stays_for_the_next_pass() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_blank_pdf(&input.path().join("scan.pdf"));

    let cfg = test_config(input.path(), output.path(), false);
    let pipeline = Pipeline::new(
        &cfg,
        "",
        QueueAnnotator::always(ann("s", "k", "t", "doc.txt")),
        LopdfStore::new(&cfg),
    )
    .unwrap();
    let intake = Intake::new(&cfg, pipeline);

    let summary = intake.poll_once();
    assert_eq!(summary.count(FileStatus::Rejected), 1);
    assert!(input.path().join("scan.pdf").exists());
    assert_eq!(intake.scan().unwrap().len(), 1);
}
