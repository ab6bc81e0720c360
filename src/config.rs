// MIT License
// Copyright (c) 2024 Graham King

use std::env;
use std::path;

const DB_NAME: &str = "article-dedup.db";
const CFG_DIR: &str = ".config/article-dedup";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Set variable {0}")]
    MissingVar(&'static str),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Local SQLite database (see --db-path)
    #[default]
    Sqlite,
    /// Supabase REST API, credentials from the environment
    Supabase,
}

pub struct SupabaseCredentials {
    pub url: String,
    pub service_key: String,
}

impl SupabaseCredentials {
    pub fn from_env() -> Result<SupabaseCredentials, ConfigError> {
        SupabaseCredentials::from_lookup(|name| env::var(name).ok())
    }

    // The Next.js app exposes the URL as NEXT_PUBLIC_SUPABASE_URL, ops scripts use SUPABASE_URL
    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<SupabaseCredentials, ConfigError> {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let url = present("SUPABASE_URL")
            .or_else(|| present("NEXT_PUBLIC_SUPABASE_URL"))
            .ok_or(ConfigError::MissingVar("SUPABASE_URL"))?;
        let service_key = present("SUPABASE_SERVICE_ROLE_KEY")
            .ok_or(ConfigError::MissingVar("SUPABASE_SERVICE_ROLE_KEY"))?;
        Ok(SupabaseCredentials { url, service_key })
    }
}

pub fn openai_api_key() -> Result<String, ConfigError> {
    env::var("OPENAI_API_KEY").map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY"))
}

/// `$HOME/.config/article-dedup/article-dedup.db`, creating the directory
pub fn default_db_path() -> anyhow::Result<path::PathBuf> {
    let user_home = env::var("HOME").map_err(|_| ConfigError::MissingVar("HOME"))?;
    let cfg_dir = path::Path::new(&user_home).join(CFG_DIR);
    std::fs::create_dir_all(&cfg_dir)?;
    Ok(cfg_dir.join(DB_NAME))
}
