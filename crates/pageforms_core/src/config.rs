use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::predicate::MatchMode;
use crate::schema::SmwSchema;

pub const DEFAULT_ARTICLE_PATH: &str = "/$1";
pub const DEFAULT_MAX_VALUES: usize = 1000;
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 86_400;
pub const DEFAULT_BLANK_NAMESPACE_LABEL: &str = "Main";

/// MediaWiki's stock `$wgNamespacesWithSubpages`.
const DEFAULT_NAMESPACES_WITH_SUBPAGES: [i32; 13] = [1, 2, 3, 4, 5, 7, 8, 9, 10, 11, 12, 13, 15];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct PageFormsConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub autocomplete: AutocompleteSection,
    #[serde(default)]
    pub forms: FormsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub url: Option<String>,
    pub article_path: Option<String>,
    #[serde(default)]
    pub custom_namespaces: Vec<CustomNamespace>,
    pub namespaces_with_subpages: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CustomNamespace {
    pub name: String,
    pub id: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct AutocompleteSection {
    pub max_values: Option<usize>,
    pub cache_values: Option<bool>,
    pub cache_timeout_secs: Option<u64>,
    pub on_all_chars: Option<bool>,
    pub use_display_title: Option<bool>,
    pub smw_store: Option<String>,
    pub cargo_enabled: Option<bool>,
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct FormsSection {
    pub link_all_red_links_to_forms: Option<bool>,
    pub blank_namespace_label: Option<String>,
    pub auto_create_user: Option<String>,
}

/// Autocomplete knobs after env overrides and defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocompleteSettings {
    pub max_values: usize,
    pub cache_values: bool,
    pub cache_timeout: Duration,
    pub match_mode: MatchMode,
    pub use_display_title: bool,
    pub smw_schema: Option<SmwSchema>,
    pub cargo_enabled: bool,
    pub urls: BTreeMap<String, String>,
}

impl Default for AutocompleteSettings {
    fn default() -> Self {
        PageFormsConfig::default().autocomplete_settings()
    }
}

impl PageFormsConfig {
    pub fn autocomplete_settings(&self) -> AutocompleteSettings {
        let section = &self.autocomplete;
        let max_values = env_parse::<usize>("PAGEFORMS_MAX_VALUES")
            .or(section.max_values)
            .unwrap_or(DEFAULT_MAX_VALUES)
            .max(1);
        let cache_values = env_flag("PAGEFORMS_CACHE_VALUES")
            .or(section.cache_values)
            .unwrap_or(false);
        let on_all_chars = env_flag("PAGEFORMS_ON_ALL_CHARS")
            .or(section.on_all_chars)
            .unwrap_or(false);
        let smw_store = env_string("PAGEFORMS_SMW_STORE").or_else(|| section.smw_store.clone());

        AutocompleteSettings {
            max_values,
            cache_values,
            cache_timeout: Duration::from_secs(
                section
                    .cache_timeout_secs
                    .unwrap_or(DEFAULT_CACHE_TIMEOUT_SECS),
            ),
            match_mode: if on_all_chars {
                MatchMode::Anywhere
            } else {
                MatchMode::PrefixOrWord
            },
            use_display_title: section.use_display_title.unwrap_or(false),
            smw_schema: smw_store.as_deref().and_then(SmwSchema::from_store_name),
            cargo_enabled: section.cargo_enabled.unwrap_or(false),
            urls: section.urls.clone(),
        }
    }

    pub fn article_path(&self) -> &str {
        self.wiki
            .article_path
            .as_deref()
            .unwrap_or(DEFAULT_ARTICLE_PATH)
    }

    pub fn namespace_has_subpages(&self, namespace: i32) -> bool {
        match &self.wiki.namespaces_with_subpages {
            Some(list) => list.contains(&namespace),
            None => DEFAULT_NAMESPACES_WITH_SUBPAGES.contains(&namespace),
        }
    }

    pub fn link_all_red_links_to_forms(&self) -> bool {
        self.forms.link_all_red_links_to_forms.unwrap_or(false)
    }

    pub fn blank_namespace_label(&self) -> &str {
        self.forms
            .blank_namespace_label
            .as_deref()
            .unwrap_or(DEFAULT_BLANK_NAMESPACE_LABEL)
    }
}

/// Load and parse a PageFormsConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<PageFormsConfig> {
    if !config_path.exists() {
        return Ok(PageFormsConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: PageFormsConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

pub(crate) fn env_string(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|value| value.parse::<T>().ok())
}

pub(crate) fn env_flag(name: &str) -> Option<bool> {
    let value = env_string(name)?.to_ascii_lowercase();
    match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
