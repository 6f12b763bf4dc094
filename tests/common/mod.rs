//! Shared fixtures for integration tests: generated PDFs and a scripted
//! chat model that answers only from the context it is given.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use resume_advisor::config::Config;
use resume_advisor::embedding::HashingEmbedder;
use resume_advisor::error::{AdvisorError, Result};
use resume_advisor::generate::{ChatModel, ChatRequest, ABSTENTION};
use resume_advisor::session::Engine;

/// Build a PDF with one page per entry; each page is a list of text lines.
pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 11.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A two-page resume used across tests.
pub fn resume_pdf() -> Vec<u8> {
    pdf_with_pages(&[
        &[
            "Jane Doe",
            "Senior Software Engineer",
            "Skills: Rust, Python, Kubernetes, PostgreSQL",
        ],
        &[
            "Experience: Acme Corp, Staff Engineer, 2019 to 2024",
            "Education: BSc Computer Science, University of Leeds",
            "Certifications: AWS Solutions Architect",
        ],
    ])
}

/// A different one-page resume.
pub fn other_resume_pdf() -> Vec<u8> {
    pdf_with_pages(&[&[
        "John Roe",
        "Skills: Haskell, Erlang",
        "Experience: Initech, Engineer, 2015 to 2020",
    ]])
}

/// Answers with the first context line sharing a word (five letters or
/// more) with the question, or the abstention sentence when none does.
#[derive(Default)]
pub struct ScriptedChat {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl ScriptedChat {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AdvisorError::Generation(
                "model endpoint returned 503 Service Unavailable: overloaded".into(),
            ));
        }

        let system = &request.messages[0].content;
        let context = system.split("Context:\n").nth(1).unwrap_or("");
        let question = request.messages[1].content.to_lowercase();
        let keywords: Vec<String> = question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 5)
            .map(str::to_string)
            .collect();

        let hit = context.lines().find(|line| {
            let line = line.to_lowercase();
            keywords.iter().any(|k| line.contains(k.as_str()))
        });
        Ok(match hit {
            Some(line) => line.trim().to_string(),
            None => ABSTENTION.to_string(),
        })
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.provider = "hashing".to_string();
    config.embedding.dims = 256;
    config
}

pub fn engine_with(chat: Arc<ScriptedChat>) -> Engine {
    let config = test_config();
    let embedder = Arc::new(HashingEmbedder::new(config.embedding.dims));
    Engine::new(config, embedder, chat)
}
