#![allow(dead_code)]

use anyhow::{anyhow, Result};
use lopdf::{dictionary, Document, Object};
use pdf_annotator::{
    annotation::DocumentAnnotation,
    annotator::Annotator,
    config::Config,
    confirm::{Confirm, Question},
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

/// Writes a one-page PDF with no metadata.
pub fn write_blank_pdf(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("write test PDF");
}

pub fn ann(summary: &str, keywords: &str, title: &str, filename: &str) -> DocumentAnnotation {
    DocumentAnnotation {
        summary: summary.into(),
        keywords: keywords.into(),
        title: title.into(),
        filename: filename.into(),
    }
}

pub fn test_config(input: &Path, output: &Path, cautious: bool) -> Config {
    let mut cfg = Config::default();
    cfg.paths.input_dir = input.display().to_string();
    cfg.paths.output_dir = output.display().to_string();
    cfg.intake.poll_interval_secs = 0;
    cfg.intake.task_pause_secs = 0;
    cfg.intake.cautious = cautious;
    cfg
}

/// Hands out canned results in order; `Err` entries become annotator failures.
pub struct QueueAnnotator {
    responses: RefCell<VecDeque<Result<DocumentAnnotation, String>>>,
    pub calls: Rc<RefCell<usize>>,
}

impl QueueAnnotator {
    pub fn new(responses: Vec<Result<DocumentAnnotation, String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: Rc::new(RefCell::new(0)),
        }
    }

    pub fn always(annotation: DocumentAnnotation) -> Self {
        Self::new(vec![Ok(annotation)])
    }
}

impl Annotator for QueueAnnotator {
    fn annotate(&self, document: &[u8], _instructions: &str) -> Result<DocumentAnnotation> {
        assert!(document.starts_with(b"%PDF"), "annotator received non-PDF bytes");
        *self.calls.borrow_mut() += 1;
        let mut queue = self.responses.borrow_mut();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match next {
            Some(Ok(a)) => Ok(a),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Err(anyhow!("no canned response")),
        }
    }
}

/// Answers confirmations from a script and records every question asked.
pub struct ScriptedConfirm {
    answers: RefCell<VecDeque<bool>>,
    pub asked: Rc<RefCell<Vec<Question>>>,
    probe: Option<Box<dyn Fn(&Question)>>,
}

impl ScriptedConfirm {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            asked: Rc::new(RefCell::new(Vec::new())),
            probe: None,
        }
    }

    /// Runs `probe` on each question before answering it.
    pub fn with_probe(mut self, probe: impl Fn(&Question) + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, question: &Question) -> Result<bool> {
        if let Some(probe) = &self.probe {
            probe(question);
        }
        self.asked.borrow_mut().push(question.clone());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected question: {question}"))
    }
}
