// MIT License
// Copyright (c) 2024 Graham King

use std::path;

use tracing::warn;

use super::db;
use super::{ArticleStore, EmbeddingStore, StoreError};
use crate::article::{Article, Status};

pub struct SqliteStore {
    db_conn: rusqlite::Connection,
}

impl SqliteStore {
    pub fn open(db_path: &path::Path) -> Result<SqliteStore, StoreError> {
        let db_conn = rusqlite::Connection::open(db_path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", db_path.display())))?;
        SqliteStore::with_connection(db_conn)
    }

    pub fn with_connection(db_conn: rusqlite::Connection) -> Result<SqliteStore, StoreError> {
        db_conn.execute(db::CREATE_ARTICLES_TABLE, ())?;
        db_conn.execute(db::CREATE_SLUG_INDEX, ())?;
        db_conn.execute(db::CREATE_EMBEDDING_TABLE, ())?;
        Ok(SqliteStore { db_conn })
    }

    /// Insert or replace articles by id, all in one transaction
    pub fn import(&mut self, articles: &[Article]) -> Result<usize, StoreError> {
        let tx = self.db_conn.transaction()?;
        let mut stmt = tx.prepare(
            r#"INSERT INTO articles (id, title, slug, license, body_md, status, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title, slug = excluded.slug, license = excluded.license,
                 body_md = excluded.body_md, status = excluded.status,
                 created_at = excluded.created_at
            "#,
        )?;
        for a in articles {
            stmt.execute((
                &a.id,
                &a.title,
                &a.slug,
                &a.license,
                &a.body_md,
                a.status,
                a.created_at,
            ))?;
        }
        stmt.finalize()?;
        tx.commit()?;
        Ok(articles.len())
    }

    fn query(
        &self,
        where_clause: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Article>, StoreError> {
        let sql = format!(
            "SELECT {} FROM articles {where_clause} ORDER BY created_at, id",
            db::ARTICLE_COLUMNS
        );
        let mut stmt = self.db_conn.prepare(&sql)?;
        let rows = stmt.query_map(params, row_to_article)?;
        let mut out = Vec::new();
        for article in rows {
            match article {
                Ok(a) => out.push(a),
                // One bad row shouldn't hide the rest of the collection
                Err(
                    e @ (rusqlite::Error::FromSqlConversionFailure(..)
                    | rusqlite::Error::InvalidColumnType(..)),
                ) => warn!("Skipping unreadable article row: {e}"),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(out)
    }
}

fn row_to_article(row: &rusqlite::Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        license: row.get(3)?,
        body_md: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl ArticleStore for SqliteStore {
    fn with_license(&self) -> Result<Vec<Article>, StoreError> {
        self.query("WHERE license IS NOT NULL", ())
    }

    fn license_containing(&self, needle: &str) -> Result<Option<Article>, StoreError> {
        // instr, not LIKE: the URL must appear exactly and may contain % or _
        Ok(self
            .query("WHERE instr(license, ?1) > 0", [needle])?
            .into_iter()
            .next())
    }

    fn by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        Ok(self.query("WHERE slug = ?1", [slug])?.into_iter().next())
    }

    fn all(&self) -> Result<Vec<Article>, StoreError> {
        self.query("", ())
    }
}

impl EmbeddingStore for SqliteStore {
    fn missing_embeddings(&self, model: &str) -> Result<Vec<Article>, StoreError> {
        self.query(
            r#"WHERE status = ?1 AND NOT EXISTS (
                 SELECT 1 FROM article_embedding e
                 WHERE e.article_id = articles.id AND e.model = ?2)"#,
            (Status::Published, model),
        )
    }

    fn save_embedding(
        &self,
        article_id: &str,
        model: &str,
        embedding: &[f64],
    ) -> Result<(), StoreError> {
        self.db_conn.execute(
            r#"INSERT INTO article_embedding (article_id, model, embed) VALUES (?1, ?2, ?3)
               ON CONFLICT(article_id, model) DO UPDATE SET embed = excluded.embed"#,
            (article_id, model, f64_slice_to_u8_vec(embedding)),
        )?;
        Ok(())
    }
}

impl SqliteStore {
    #[cfg(test)]
    fn load_embedding(
        &self,
        article_id: &str,
        model: &str,
    ) -> Result<Option<Vec<f64>>, StoreError> {
        use rusqlite::OptionalExtension;
        let blob: Option<Vec<u8>> = self
            .db_conn
            .query_row(
                "SELECT embed FROM article_embedding WHERE article_id = ?1 AND model = ?2",
                (article_id, model),
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(u8_vec_to_f64_vec))
    }
}

fn f64_slice_to_u8_vec(vec: &[f64]) -> Vec<u8> {
    let mut u8_vec: Vec<u8> = Vec::with_capacity(std::mem::size_of_val(vec));
    for num in vec {
        u8_vec.extend_from_slice(&num.to_le_bytes());
    }
    u8_vec
}

#[cfg(test)]
fn u8_vec_to_f64_vec(vec: Vec<u8>) -> Vec<f64> {
    vec.chunks_exact(std::mem::size_of::<f64>())
        .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, slug: &str, license: Option<&str>, status: Status, day: u32) -> Article {
        Article {
            id: id.to_string(),
            title: slug.replace('-', " "),
            slug: slug.to_string(),
            license: license.map(str::to_string),
            body_md: format!("body of {id}"),
            status,
            created_at: Some(
                chrono::NaiveDate::from_ymd_opt(2024, 1, day)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
                    .and_utc(),
            ),
        }
    }

    fn store() -> SqliteStore {
        let mut s =
            SqliteStore::with_connection(rusqlite::Connection::open_in_memory().unwrap()).unwrap();
        s.import(&[
            article("b", "sleep-tips", Some("AAP | URL: https://aap.org/sleep | x"), Status::Published, 2),
            article("a", "feeding-basics", Some("CDC | URL: https://cdc.gov/a | y"), Status::Published, 1),
            article("c", "draft-post", None, Status::Draft, 3),
        ])
        .unwrap();
        s
    }

    #[test]
    fn all_is_oldest_first() {
        let ids: Vec<String> = store().all().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn lookups() {
        let s = store();
        assert_eq!(s.with_license().unwrap().len(), 2);
        assert_eq!(s.by_slug("sleep-tips").unwrap().unwrap().id, "b");
        assert!(s.by_slug("nope").unwrap().is_none());
        assert_eq!(
            s.license_containing("https://cdc.gov/a").unwrap().unwrap().id,
            "a"
        );
        assert!(s.license_containing("https://cdc.gov/b").unwrap().is_none());
    }

    #[test]
    fn unreadable_rows_skipped() {
        let s = store();
        s.db_conn
            .execute(
                "INSERT INTO articles (id, title, slug, status) VALUES ('d', 'Odd', 'odd', 'review')",
                (),
            )
            .unwrap();
        let ids: Vec<String> = s.all().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(s.by_slug("odd").unwrap().is_none());
    }

    #[test]
    fn import_upserts() {
        let mut s = store();
        let mut changed = article("a", "feeding-basics-v2", None, Status::Archived, 1);
        changed.title = "Feeding Basics v2".to_string();
        s.import(&[changed]).unwrap();
        let all = s.all().unwrap();
        assert_eq!(all.len(), 3);
        let a = all.into_iter().find(|a| a.id == "a").unwrap();
        assert_eq!(a.slug, "feeding-basics-v2");
        assert_eq!(a.status, Status::Archived);
        assert!(a.license.is_none());
    }

    #[test]
    fn embeddings_only_for_published_and_missing() {
        let s = store();
        let model = "text-embedding-3-small";
        let pending: Vec<String> = s
            .missing_embeddings(model)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(pending, ["a", "b"]);

        s.save_embedding("a", model, &[0.25, -1.5]).unwrap();
        assert_eq!(s.load_embedding("a", model).unwrap(), Some(vec![0.25, -1.5]));
        assert_eq!(s.missing_embeddings(model).unwrap().len(), 1);
        // another model starts from scratch
        assert_eq!(s.missing_embeddings("other-model").unwrap().len(), 2);
    }
}
