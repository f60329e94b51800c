//! Runtime configuration, read from the process environment (and `.env`).

use std::fmt;
use std::str::FromStr;
use std::sync::Once;

use crate::error::{CatalogError, Result};

pub const DEFAULT_API_BASE: &str = "https://open.youzanyun.com";
pub const DEFAULT_PAGE_SIZE: usize = 2;
pub const DEFAULT_MAX_PAGES: u32 = 99;

static DOTENV: Once = Once::new();

/// Which deployment the process runs as. Dev turns on verbose logging and a separate db file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Online,
}

impl Profile {
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Profile::Dev => "debug",
            Profile::Online => "info",
        }
    }

    fn default_db_path(self) -> &'static str {
        match self {
            Profile::Dev => "catalog-dev.db",
            Profile::Online => "catalog.db",
        }
    }
}

#[derive(Clone)]
pub struct CatalogConfig {
    pub profile: Profile,
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
    pub grant_id: i64,
    pub page_size: usize,
    pub max_pages: u32,
    /// None keeps the HTTP transport's own default.
    pub http_timeout_secs: Option<u64>,
    pub db_path: String,
}

impl fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("profile", &self.profile)
            .field("api_base", &self.api_base)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("grant_id", &self.grant_id)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("db_path", &self.db_path)
            .finish()
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

impl CatalogConfig {
    /// Load `.env` (once) and read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        DOTENV.call_once(|| {
            let _ = dotenv::dotenv();
        });
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| CatalogError::config(format!("missing env var {key}")))
        };
        fn parsed<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
            match raw {
                Some(v) => v
                    .trim()
                    .parse::<T>()
                    .map(Some)
                    .map_err(|_| CatalogError::config(format!("{key} is not a valid number: {v}"))),
                None => Ok(None),
            }
        }

        let profile = if get("CATALOG_DEBUG").is_some_and(|v| is_truthy(&v)) {
            Profile::Dev
        } else {
            Profile::Online
        };

        let grant_raw = required("CATALOG_GRANT_ID")?;
        let grant_id = grant_raw.trim().parse::<i64>().map_err(|_| {
            CatalogError::config(format!("CATALOG_GRANT_ID is not a valid number: {grant_raw}"))
        })?;
        let page_size =
            parsed::<usize>("CATALOG_PAGE_SIZE", get("CATALOG_PAGE_SIZE"))?.unwrap_or(DEFAULT_PAGE_SIZE);
        let max_pages =
            parsed::<u32>("CATALOG_MAX_PAGES", get("CATALOG_MAX_PAGES"))?.unwrap_or(DEFAULT_MAX_PAGES);
        if page_size == 0 {
            return Err(CatalogError::config("CATALOG_PAGE_SIZE must be at least 1"));
        }
        if max_pages == 0 {
            return Err(CatalogError::config("CATALOG_MAX_PAGES must be at least 1"));
        }

        Ok(Self {
            profile,
            api_base: get("CATALOG_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            client_id: required("CATALOG_CLIENT_ID")?,
            client_secret: required("CATALOG_CLIENT_SECRET")?,
            grant_id,
            page_size,
            max_pages,
            http_timeout_secs: parsed::<u64>(
                "CATALOG_HTTP_TIMEOUT_SECS",
                get("CATALOG_HTTP_TIMEOUT_SECS"),
            )?,
            db_path: get("CATALOG_DB_PATH").unwrap_or_else(|| profile.default_db_path().to_string()),
        })
    }

    pub fn log_filter(&self) -> &'static str {
        self.profile.default_log_filter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("CATALOG_CLIENT_ID", "cid"),
        ("CATALOG_CLIENT_SECRET", "secret"),
        ("CATALOG_GRANT_ID", "42"),
    ];

    #[test]
    fn defaults_apply_when_optional_keys_missing() {
        let cfg = CatalogConfig::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(cfg.profile, Profile::Online);
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.grant_id, 42);
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(cfg.http_timeout_secs, None);
        assert_eq!(cfg.db_path, "catalog.db");
        assert_eq!(cfg.log_filter(), "info");
    }

    #[test]
    fn debug_flag_selects_dev_profile() {
        let mut pairs = BASE.to_vec();
        pairs.push(("CATALOG_DEBUG", "yes"));
        pairs.push(("CATALOG_API_BASE", "http://localhost:9000/"));
        let cfg = CatalogConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.profile, Profile::Dev);
        assert_eq!(cfg.db_path, "catalog-dev.db");
        assert_eq!(cfg.api_base, "http://localhost:9000");
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = CatalogConfig::from_lookup(lookup(&[("CATALOG_CLIENT_ID", "cid")])).unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("CATALOG_PAGE_SIZE", "0"));
        assert!(CatalogConfig::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("CATALOG_GRANT_ID", "not-a-number"));
        // later entries win in the map
        assert!(CatalogConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let cfg = CatalogConfig::from_lookup(lookup(BASE)).unwrap();
        let shown = format!("{cfg:?}");
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("secret\""));
    }
}
