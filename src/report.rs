// MIT License
// Copyright (c) 2024 Graham King

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::info;

use crate::article::Article;
use crate::normalize::normalize_url;
use crate::similarity;
use crate::store::{ArticleStore, StoreError};

pub const DEFAULT_SIMILARITY: f64 = 0.8;

// The content pass compares every pair, keep it to a few hundred articles
pub const DEFAULT_SAMPLE: usize = 200;

#[derive(Debug, Clone)]
pub struct Options {
    pub check_urls: bool,
    pub check_slugs: bool,
    pub check_content: bool,
    pub threshold: f64,
    pub sample: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            check_urls: true,
            check_slugs: true,
            check_content: true,
            threshold: DEFAULT_SIMILARITY,
            sample: DEFAULT_SAMPLE,
        }
    }
}

#[derive(Debug)]
pub struct UrlGroup {
    pub url: String,
    pub ids: Vec<String>,
}

#[derive(Debug)]
pub struct SlugGroup {
    pub slug: String,
    pub articles: Vec<Article>,
}

#[derive(Debug)]
pub struct SimilarPair {
    pub a: Article,
    pub b: Article,
    pub similarity: f64,
    pub title_overlap: f64,
}

#[derive(Debug)]
pub struct Report {
    pub options: Options,
    pub total: usize,
    pub url_groups: Vec<UrlGroup>,
    pub slug_groups: Vec<SlugGroup>,
    pub similar: Vec<SimilarPair>,
    /// How many articles the content pass looked at
    pub sampled: usize,
}

impl Report {
    /// One read of the whole collection, then everything happens in memory
    pub fn build<S: ArticleStore + ?Sized>(
        store: &S,
        options: &Options,
    ) -> Result<Report, StoreError> {
        let articles = store.all()?;
        info!("Loaded {} articles", articles.len());

        let url_groups = if options.check_urls {
            url_groups(&articles)
        } else {
            vec![]
        };
        let slug_groups = if options.check_slugs {
            slug_groups(&articles)
        } else {
            vec![]
        };
        let (similar, sampled) = if options.check_content {
            let sample = &articles[..articles.len().min(options.sample)];
            (similar_pairs(sample, options.threshold), sample.len())
        } else {
            (vec![], 0)
        };

        Ok(Report {
            options: options.clone(),
            total: articles.len(),
            url_groups,
            slug_groups,
            similar,
            sampled,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.url_groups.is_empty() && self.slug_groups.is_empty() && self.similar.is_empty()
    }

    /// SQL removing all but the oldest article of each URL and slug group.
    /// For an operator to review and run by hand, nothing here executes it.
    pub fn deletion_sql(&self) -> Option<String> {
        let groups: Vec<Vec<&str>> = self
            .url_groups
            .iter()
            .map(|g| g.ids.iter().map(String::as_str).collect::<Vec<_>>())
            .chain(
                self.slug_groups
                    .iter()
                    .map(|g| g.articles.iter().map(|a| a.id.as_str()).collect::<Vec<_>>()),
            )
            .collect();
        // The oldest of every group survives, even when it is a newer copy in another group
        let keep: HashSet<&str> = groups
            .iter()
            .filter_map(|ids| ids.first().copied())
            .collect();
        let mut seen = HashSet::new();
        let mut doomed = Vec::new();
        for id in groups.iter().flatten() {
            if !keep.contains(id) && seen.insert(*id) {
                doomed.push(*id);
            }
        }
        if doomed.is_empty() {
            return None;
        }
        let list = doomed
            .iter()
            .map(|id| format!("'{}'", id.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("DELETE FROM articles WHERE id IN ({list});"))
    }
}

fn url_groups(articles: &[Article]) -> Vec<UrlGroup> {
    let mut by_url: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for a in articles {
        if let Some(url) = a.source_url() {
            by_url.entry(normalize_url(url)).or_default().push(a.id.clone());
        }
    }
    by_url
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(url, ids)| UrlGroup { url, ids })
        .collect()
}

fn slug_groups(articles: &[Article]) -> Vec<SlugGroup> {
    let mut by_slug: BTreeMap<&str, Vec<Article>> = BTreeMap::new();
    for a in articles {
        by_slug.entry(&a.slug).or_default().push(a.clone());
    }
    by_slug
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(slug, articles)| SlugGroup {
            slug: slug.to_string(),
            articles,
        })
        .collect()
}

fn similar_pairs(articles: &[Article], threshold: f64) -> Vec<SimilarPair> {
    let token_sets: Vec<_> = articles
        .iter()
        .map(|a| similarity::tokens(&a.body_md))
        .collect();
    let mut out = Vec::new();
    for (i, a) in articles.iter().enumerate() {
        for (j, b) in articles.iter().enumerate().skip(i + 1) {
            let score = similarity::jaccard_sets(&token_sets[i], &token_sets[j]);
            if score >= threshold {
                out.push(SimilarPair {
                    a: a.clone(),
                    b: b.clone(),
                    similarity: score,
                    title_overlap: similarity::title_overlap(&a.title, &b.title),
                });
            }
        }
    }
    out.sort_by(|x, y| y.similarity.total_cmp(&x.similarity));
    out
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scanned {} articles", self.total)?;

        if self.options.check_urls {
            writeln!(f, "\nDuplicate source URLs: {}", self.url_groups.len())?;
            for g in &self.url_groups {
                writeln!(f, "  {} ({} articles)", g.url, g.ids.len())?;
                for id in &g.ids {
                    writeln!(f, "    - {id}")?;
                }
            }
        }

        if self.options.check_slugs {
            writeln!(f, "\nDuplicate slugs: {}", self.slug_groups.len())?;
            for g in &self.slug_groups {
                writeln!(f, "  {} ({} articles)", g.slug, g.articles.len())?;
                for a in &g.articles {
                    let created = a
                        .created_at
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "unknown date".to_string());
                    writeln!(f, "    - {} \"{}\" [{}, {created}]", a.id, a.title, a.status)?;
                }
            }
        }

        if self.options.check_content {
            writeln!(
                f,
                "\nSimilar content (>= {:.0}%, first {} articles): {}",
                self.options.threshold * 100.0,
                self.sampled,
                self.similar.len()
            )?;
            for p in &self.similar {
                writeln!(
                    f,
                    "  {:.1}% \"{}\" [{}] <-> \"{}\" [{}] (titles {:.0}% alike)",
                    p.similarity * 100.0,
                    p.a.title,
                    p.a.id,
                    p.b.title,
                    p.b.id,
                    p.title_overlap * 100.0
                )?;
            }
        }

        if self.is_clean() {
            writeln!(f, "\nNo duplicates found")?;
        }
        Ok(())
    }
}
