// MIT License
// Copyright (c) 2024 Graham King

// Slug is not UNIQUE: imported snapshots carry legacy collisions and finding
// those is the point.
pub const CREATE_ARTICLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    slug TEXT NOT NULL,
    license TEXT NULL,
    body_md TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'draft',
    created_at DATETIME NULL
)
"#;

pub const CREATE_SLUG_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS articles_slug ON articles (slug)";

pub const CREATE_EMBEDDING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS article_embedding (
    article_id TEXT NOT NULL,
    model TEXT NOT NULL,
    embed BLOB NOT NULL,
    FOREIGN KEY (article_id) REFERENCES articles (id),
    UNIQUE (article_id, model)
)
"#;

pub const ARTICLE_COLUMNS: &str = "id, title, slug, license, body_md, status, created_at";
