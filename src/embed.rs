// MIT License
// Copyright (c) 2024 Graham King

use std::io;
use std::io::Write;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::article::Article;
use crate::store::EmbeddingStore;
use crate::term;

// Stay well inside the embedding model's 8k token input
const MAX_EMBED_CHARS: usize = 8000;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Turns text into vectors, one per input, in input order
pub trait Embedder {
    fn model(&self) -> &str;
    fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f64>>>;
}

pub struct Options {
    pub batch_size: usize,
    /// Fixed pause between batches, the only throttle we have
    pub delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            batch_size: DEFAULT_BATCH_SIZE,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

/// Embed every published article that doesn't have an embedding for this
/// model yet. Returns how many were embedded.
pub fn run<S: EmbeddingStore + ?Sized, E: Embedder + ?Sized>(
    store: &S,
    embedder: &E,
    opts: &Options,
) -> anyhow::Result<usize> {
    let model = embedder.model();
    let articles = store.missing_embeddings(model)?;
    let total = articles.len();
    info!("Embedding {total} published articles with {model}");
    if total == 0 {
        return Ok(0);
    }

    let width = term::width();
    let mut stdout = io::stdout();
    let mut done = 0;
    for (batch_idx, batch) in articles.chunks(opts.batch_size.max(1)).enumerate() {
        if batch_idx > 0 && !opts.delay.is_zero() {
            thread::sleep(opts.delay);
        }
        let inputs: Vec<String> = batch.iter().map(embed_text).collect();
        let vectors = embedder
            .embed(&inputs)
            .with_context(|| format!("batch starting at {}", batch[0].id))?;
        for (article, vector) in batch.iter().zip(vectors) {
            // embeds cost money, save each one as soon as we have it
            store.save_embedding(&article.id, model, &vector)?;
        }
        done += batch.len();

        let progress = format!("{done} / {total}");
        match width {
            Some(w) => {
                let spaces = " ".repeat(w.saturating_sub(progress.len() + 2));
                write!(stdout, "\r[{spaces}{progress}]")?;
                stdout.flush()?;
            }
            None => info!("Embedded {progress}"),
        }
    }
    if width.is_some() {
        println!();
    }
    Ok(done)
}

/// Title and body, truncated on a char boundary
fn embed_text(a: &Article) -> String {
    let mut text = format!("{}\n\n{}", a.title, a.body_md);
    if let Some((cut, _)) = text.char_indices().nth(MAX_EMBED_CHARS) {
        text.truncate(cut);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Status;
    use crate::store::memory::{article, MemoryStore};
    use std::cell::RefCell;

    struct FakeEmbedder {
        batches: RefCell<Vec<usize>>,
        fail_on_batch: Option<usize>,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            FakeEmbedder {
                batches: RefCell::new(vec![]),
                fail_on_batch: None,
            }
        }
    }

    impl Embedder for FakeEmbedder {
        fn model(&self) -> &str {
            "fake-model"
        }

        fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f64>>> {
            let mut batches = self.batches.borrow_mut();
            if self.fail_on_batch == Some(batches.len()) {
                anyhow::bail!("HTTP error 500");
            }
            batches.push(inputs.len());
            Ok(inputs.iter().map(|s| vec![s.len() as f64]).collect())
        }
    }

    fn store(n: usize) -> MemoryStore {
        let mut articles: Vec<Article> = (0..n)
            .map(|i| article(&i.to_string(), &format!("Post {i}"), None, "body"))
            .collect();
        let mut draft = article("draft", "Unfinished", None, "wip");
        draft.status = Status::Draft;
        articles.push(draft);
        MemoryStore::new(articles)
    }

    fn quick(batch_size: usize) -> Options {
        Options {
            batch_size,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn fixed_size_batches() {
        let s = store(5);
        let e = FakeEmbedder::new();
        assert_eq!(run(&s, &e, &quick(2)).unwrap(), 5);
        assert_eq!(*e.batches.borrow(), vec![2, 2, 1]);
        // the draft is left alone
        assert_eq!(s.embeddings.borrow().len(), 5);
        assert!(!s
            .embeddings
            .borrow()
            .contains_key(&("draft".to_string(), "fake-model".to_string())));
    }

    #[test]
    fn existing_embeddings_not_recomputed() {
        let s = store(3);
        let e = FakeEmbedder::new();
        run(&s, &e, &quick(10)).unwrap();
        assert_eq!(run(&s, &e, &quick(10)).unwrap(), 0);
        assert_eq!(*e.batches.borrow(), vec![3]);
    }

    #[test]
    fn failed_batch_keeps_earlier_work() {
        let s = store(4);
        let e = FakeEmbedder {
            fail_on_batch: Some(1),
            ..FakeEmbedder::new()
        };
        let err = run(&s, &e, &quick(2)).unwrap_err();
        assert!(format!("{err:#}").contains("HTTP error 500"));
        assert_eq!(s.embeddings.borrow().len(), 2);
    }

    #[test]
    fn long_bodies_truncated() {
        let long = "é".repeat(MAX_EMBED_CHARS * 2);
        let text = embed_text(&article("1", "T", None, &long));
        assert_eq!(text.chars().count(), MAX_EMBED_CHARS);
        assert!(text.starts_with("T\n\n"));
    }
}
