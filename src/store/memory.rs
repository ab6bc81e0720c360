// MIT License
// Copyright (c) 2024 Graham King

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{ArticleStore, EmbeddingStore, StoreError};
use crate::article::{Article, Status};

/// Vector-backed store for tests. Lookups of `fail_slug` fail as if the
/// backend went away; `offline` fails everything.
#[derive(Default)]
pub struct MemoryStore {
    pub articles: Vec<Article>,
    pub fail_slug: Option<String>,
    pub offline: bool,
    pub reads: Cell<usize>,
    pub embeddings: RefCell<HashMap<(String, String), Vec<f64>>>,
}

impl MemoryStore {
    pub fn new(articles: Vec<Article>) -> MemoryStore {
        MemoryStore {
            articles,
            ..Default::default()
        }
    }

    fn read(&self) -> Result<&[Article], StoreError> {
        self.reads.set(self.reads.get() + 1);
        if self.offline {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(&self.articles)
    }
}

impl ArticleStore for MemoryStore {
    fn with_license(&self) -> Result<Vec<Article>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter(|a| a.license.is_some())
            .cloned()
            .collect())
    }

    fn license_containing(&self, needle: &str) -> Result<Option<Article>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .find(|a| a.license.as_deref().is_some_and(|l| l.contains(needle)))
            .cloned())
    }

    fn by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        if self.fail_slug.as_deref() == Some(slug) {
            return Err(StoreError::Unavailable(format!("lookup of {slug} timed out")));
        }
        Ok(self.read()?.iter().find(|a| a.slug == slug).cloned())
    }

    fn all(&self) -> Result<Vec<Article>, StoreError> {
        Ok(self.read()?.to_vec())
    }
}

impl EmbeddingStore for MemoryStore {
    fn missing_embeddings(&self, model: &str) -> Result<Vec<Article>, StoreError> {
        let done = self.embeddings.borrow();
        Ok(self
            .read()?
            .iter()
            .filter(|a| a.status == Status::Published)
            .filter(|a| !done.contains_key(&(a.id.clone(), model.to_string())))
            .cloned()
            .collect())
    }

    fn save_embedding(
        &self,
        article_id: &str,
        model: &str,
        embedding: &[f64],
    ) -> Result<(), StoreError> {
        self.embeddings.borrow_mut().insert(
            (article_id.to_string(), model.to_string()),
            embedding.to_vec(),
        );
        Ok(())
    }
}

/// Published article with a fixed creation order
pub fn article(id: &str, title: &str, license: Option<&str>, body: &str) -> Article {
    Article {
        id: id.to_string(),
        title: title.to_string(),
        slug: crate::slug::slugify(title),
        license: license.map(str::to_string),
        body_md: body.to_string(),
        status: Status::Published,
        created_at: None,
    }
}
