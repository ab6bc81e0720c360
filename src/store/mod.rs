// MIT License
// Copyright (c) 2024 Graham King

use crate::article::Article;

mod db;
#[cfg(test)]
pub mod memory;
mod sqlite;
mod supabase;

pub use sqlite::SqliteStore;
pub use supabase::SupabaseStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("article store unavailable: {0}")]
    Unavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unexpected response from article store: {0}")]
    Decode(String),
}

/// Read access to the article collection. The dedup engine never writes
/// through this.
pub trait ArticleStore {
    /// Every article that has a license annotation
    fn with_license(&self) -> Result<Vec<Article>, StoreError>;

    /// First article whose license text contains `needle` verbatim
    fn license_containing(&self, needle: &str) -> Result<Option<Article>, StoreError>;

    fn by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError>;

    /// The whole collection, oldest first
    fn all(&self) -> Result<Vec<Article>, StoreError>;
}

/// Where generated embeddings live
pub trait EmbeddingStore {
    /// Published articles with no embedding yet for this model
    fn missing_embeddings(&self, model: &str) -> Result<Vec<Article>, StoreError>;

    fn save_embedding(
        &self,
        article_id: &str,
        model: &str,
        embedding: &[f64],
    ) -> Result<(), StoreError>;
}
