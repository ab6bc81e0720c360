// MIT License
// Copyright (c) 2024 Graham King

use std::fmt;

use tracing::{debug, warn};

use crate::normalize::normalize_url;
use crate::slug::slugify;
use crate::store::{ArticleStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NormalizedUrl,
    UrlSubstring,
    UrlAndTitle,
    SlugCollision,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reason::NormalizedUrl => "URL already exists (normalized match)",
            Reason::UrlSubstring => "URL exists",
            Reason::UrlAndTitle => "URL and title both exist (exact duplicate)",
            Reason::SlugCollision => "Title exists (slug collision)",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Unique,
    Duplicate { reason: Reason, existing_id: String },
}

impl Verdict {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Verdict::Duplicate { .. })
    }

    fn duplicate(reason: Reason, existing_id: &str) -> Verdict {
        Verdict::Duplicate {
            reason,
            existing_id: existing_id.to_string(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Unique => write!(f, "not a duplicate"),
            Verdict::Duplicate {
                reason,
                existing_id,
            } => write!(f, "duplicate: {reason} [existing id {existing_id}]"),
        }
    }
}

/// An article an ingestion job is about to create
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// What to do when the store fails while checking one candidate of many
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OnReadError {
    /// Stop the whole run with the error
    #[default]
    Abort,
    /// Log it, mark the candidate as skipped, carry on
    Skip,
}

#[derive(Debug)]
pub enum Outcome {
    Checked(Verdict),
    Skipped(StoreError),
}

pub struct Checker<'a, S: ArticleStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ArticleStore + ?Sized> Checker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Checker { store }
    }

    /// Does an article with this source URL or this title already exist?
    /// Read-only. A store failure is an error, never a "not a duplicate".
    pub fn exists(&self, url: Option<&str>, title: Option<&str>) -> Result<Verdict, StoreError> {
        let url = url.map(str::trim).filter(|u| !u.is_empty());
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        if url.is_none() && title.is_none() {
            return Ok(Verdict::Unique);
        }
        let normalized = url.map(normalize_url);

        let slug_match = match title.map(slugify) {
            Some(slug) if !slug.is_empty() => self.store.by_slug(&slug)?,
            _ => None,
        };

        // Same title and same source: the most specific answer wins
        if let (Some(existing), Some(wanted)) = (&slug_match, &normalized) {
            if existing.source_url().map(normalize_url).as_ref() == Some(wanted) {
                return Ok(Verdict::duplicate(Reason::UrlAndTitle, &existing.id));
            }
        }

        if let (Some(raw), Some(wanted)) = (url, &normalized) {
            for existing in self.store.with_license()? {
                let Some(found) = existing.source_url() else {
                    continue;
                };
                if normalize_url(found) == *wanted {
                    return Ok(Verdict::duplicate(Reason::NormalizedUrl, &existing.id));
                }
            }
            // Older records have the URL in the license without the "URL:" label
            if let Some(existing) = self.store.license_containing(raw)? {
                return Ok(Verdict::duplicate(Reason::UrlSubstring, &existing.id));
            }
        }

        if let Some(existing) = slug_match {
            return Ok(Verdict::duplicate(Reason::SlugCollision, &existing.id));
        }
        Ok(Verdict::Unique)
    }

    /// Check every candidate in order, handling store failures per `policy`
    pub fn check_all(
        &self,
        candidates: &[Candidate],
        policy: OnReadError,
    ) -> Result<Vec<Outcome>, StoreError> {
        let mut out = Vec::with_capacity(candidates.len());
        for (idx, c) in candidates.iter().enumerate() {
            match self.exists(c.url.as_deref(), c.title.as_deref()) {
                Ok(verdict) => {
                    debug!(idx, url = ?c.url, title = ?c.title, %verdict, "checked");
                    out.push(Outcome::Checked(verdict));
                }
                Err(err) if policy == OnReadError::Skip => {
                    warn!(idx, url = ?c.url, title = ?c.title, "skipping candidate: {err}");
                    out.push(Outcome::Skipped(err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }
}
