mod common;

use common::write_blank_pdf;
use pdf_annotator::{
    config::Config,
    document::{pdf::decode_text_string, Document, DocumentStore, LopdfStore, MetadataFields},
};

fn fields(title: &str) -> MetadataFields {
    MetadataFields {
        title: title.into(),
        description: "a description".into(),
        subject: "alpha, beta".into(),
    }
}

#[test]
fn uncommitted_transaction_changes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("a.pdf");
    write_blank_pdf(&path);

    let mut doc = LopdfStore::new(&Config::default()).open(&path).unwrap();
    {
        let mut tx = doc.begin_metadata();
        tx.set_title("never written");
    }
    assert_eq!(doc.info_field("Title"), None);
    assert_eq!(doc.xmp_packet(), None);

    let mut tx = doc.begin_metadata();
    tx.set_title("written");
    tx.commit().unwrap();
    assert_eq!(doc.info_field("Title").as_deref(), Some("written"));
}

#[test]
fn metadata_survives_save_and_reload() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("a.pdf");
    let dest = tmp.path().join("b.pdf");
    write_blank_pdf(&src);

    let store = LopdfStore::new(&Config::default());
    let mut doc = store.open(&src).unwrap();
    doc.write_metadata(&fields("Invoice (draft) & notes")).unwrap();
    doc.save_as(&dest).unwrap();

    let reloaded = store.open(&dest).unwrap();
    assert_eq!(reloaded.info_field("Title").as_deref(), Some("Invoice (draft) & notes"));
    assert_eq!(reloaded.info_field("Subject").as_deref(), Some("a description"));
    assert_eq!(reloaded.info_field("Keywords").as_deref(), Some("alpha, beta"));
    assert!(reloaded.info_field("ModDate").unwrap().starts_with("D:"));

    let xmp = reloaded.xmp_packet().unwrap();
    assert!(xmp.contains("Invoice (draft) &amp; notes"));
    assert!(xmp.contains("<pdf:Keywords>alpha, beta</pdf:Keywords>"));
}

#[test]
fn xmp_escapes_markup_in_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("a.pdf");
    write_blank_pdf(&path);

    let mut doc = LopdfStore::new(&Config::default()).open(&path).unwrap();
    doc.write_metadata(&MetadataFields {
        title: "<b>Lease</b>".into(),
        description: "Tenant's \"final\" copy".into(),
        subject: "rent & deposit".into(),
    })
    .unwrap();

    let xmp = doc.xmp_packet().unwrap();
    assert!(xmp.contains("&lt;b&gt;Lease&lt;/b&gt;"));
    assert!(xmp.contains("Tenant&apos;s &quot;final&quot; copy"));
    assert!(xmp.contains("<pdf:Keywords>rent &amp; deposit</pdf:Keywords>"));
    assert!(!xmp.contains("<b>"));
}

#[test]
fn non_ascii_text_round_trips_as_utf16() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("a.pdf");
    let dest = tmp.path().join("b.pdf");
    write_blank_pdf(&src);

    let store = LopdfStore::new(&Config::default());
    let mut doc = store.open(&src).unwrap();
    doc.write_metadata(&fields("Rechnung – Zahnärztin Müller")).unwrap();
    doc.save_as(&dest).unwrap();

    let reloaded = store.open(&dest).unwrap();
    assert_eq!(
        reloaded.info_field("Title").as_deref(),
        Some("Rechnung – Zahnärztin Müller")
    );
}

#[test]
fn xmp_can_be_disabled() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("a.pdf");
    write_blank_pdf(&src);

    let mut cfg = Config::default();
    cfg.metadata.write_xmp = false;
    let mut doc = LopdfStore::new(&cfg).open(&src).unwrap();
    doc.write_metadata(&fields("t")).unwrap();
    assert_eq!(doc.info_field("Title").as_deref(), Some("t"));
    assert_eq!(doc.xmp_packet(), None);
}

#[test]
fn rewriting_replaces_the_existing_packet() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("a.pdf");
    write_blank_pdf(&src);

    let mut doc = LopdfStore::new(&Config::default()).open(&src).unwrap();
    doc.write_metadata(&fields("first")).unwrap();
    doc.write_metadata(&fields("second")).unwrap();
    let xmp = doc.xmp_packet().unwrap();
    assert!(xmp.contains("second"));
    assert!(!xmp.contains("first"));
}

#[test]
fn decodes_pdfdoc_and_utf16_strings() {
    assert_eq!(decode_text_string(b"plain"), "plain");
    assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
}
