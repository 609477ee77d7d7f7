use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CachePolicy, MemoryCache, ValueCache};
use crate::config::AutocompleteSettings;
use crate::error::{AutocompleteError, ErrorPayload, Result};
use crate::external_values::{ExternalFetcher, ExternalUrlLookup};
use crate::labels::disambiguate_labels;
use crate::page_values::{CategoryLookup, ConceptLookup, NamespaceLookup, PageDirectory};
use crate::property_values::{PropertyLookup, PropertyStore};
use crate::request::{
    AutocompleteRequest, LookupQuery, ResultRecord, Selector, ValueCandidate, ValueSource,
};
use crate::schema::SmwSchema;
use crate::table_values::{TableLookup, TableStore};
use crate::title::NamespaceTable;

/// Collaborators the dispatcher queries. Optional stores may be absent.
#[derive(Clone)]
pub struct Backends {
    pub properties: Option<Arc<dyn PropertyStore>>,
    pub tables: Option<Arc<dyn TableStore>>,
    pub pages: Arc<dyn PageDirectory>,
    pub external: Arc<dyn ExternalFetcher>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AutocompleteResponse {
    Success { pfautocomplete: Vec<ResultRecord> },
    Failure { error: ErrorPayload },
}

pub struct Autocompleter {
    settings: AutocompleteSettings,
    namespaces: NamespaceTable,
    backends: Backends,
    cache: Option<Arc<dyn ValueCache>>,
}

impl Autocompleter {
    /// Uses an in-process cache when `cache_values` is on.
    pub fn new(settings: AutocompleteSettings, namespaces: NamespaceTable, backends: Backends) -> Self {
        let cache = settings
            .cache_values
            .then(|| Arc::new(MemoryCache::new()) as Arc<dyn ValueCache>);
        Self {
            settings,
            namespaces,
            backends,
            cache,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn respond(&self, request: AutocompleteRequest) -> AutocompleteResponse {
        match self.complete(request) {
            Ok(records) => AutocompleteResponse::Success {
                pfautocomplete: records,
            },
            Err(error) => {
                warn!(code = error.code(), "autocomplete request failed: {error}");
                AutocompleteResponse::Failure {
                    error: error.to_payload(),
                }
            }
        }
    }

    pub fn complete(&self, request: AutocompleteRequest) -> Result<Vec<ResultRecord>> {
        let validated = request.validate(self.settings.max_values)?;
        debug!(
            selector = validated.selector.kind(),
            limit = validated.limit,
            "dispatching autocomplete request"
        );
        let substring = Some(validated.substring.as_str()).filter(|value| !value.is_empty());
        let mode = self.settings.match_mode;
        let cache = CachePolicy {
            cache: self.cache.as_deref(),
            ttl: self.settings.cache_timeout,
        };

        match &validated.selector {
            Selector::BasedProperty { property, base } => {
                let (store, schema) = self.property_backend()?;
                let query = LookupQuery {
                    substring,
                    limit: validated.limit,
                    base: Some(base),
                };
                let lookup = PropertyLookup {
                    store,
                    schema,
                    property,
                    match_mode: mode,
                    cache,
                };
                Ok(plain_records(lookup.lookup(&query)?))
            }
            Selector::Property(property) => {
                let (store, schema) = self.property_backend()?;
                let lookup = PropertyLookup {
                    store,
                    schema,
                    property,
                    match_mode: mode,
                    cache,
                };
                Ok(plain_records(lookup.lookup(&self.query(substring, validated.limit))?))
            }
            Selector::Category(category) => {
                let lookup = CategoryLookup {
                    pages: self.backends.pages.as_ref(),
                    namespaces: &self.namespaces,
                    category,
                    match_mode: mode,
                };
                Ok(self.page_records(lookup.lookup(&self.query(substring, validated.limit))?))
            }
            Selector::Concept(concept) => {
                self.property_backend()?;
                let lookup = ConceptLookup {
                    pages: self.backends.pages.as_ref(),
                    namespaces: &self.namespaces,
                    concept,
                    match_mode: mode,
                };
                Ok(self.page_records(lookup.lookup(&self.query(substring, validated.limit))?))
            }
            Selector::TableField { table, field, base } => {
                let store = self.table_backend()?;
                let query = LookupQuery {
                    substring,
                    limit: validated.limit,
                    base: base.as_ref(),
                };
                let lookup = TableLookup {
                    store,
                    table,
                    field,
                    match_mode: mode,
                    cache,
                };
                Ok(plain_records(lookup.lookup(&query)?))
            }
            Selector::Namespace(namespace) => {
                let lookup = NamespaceLookup {
                    pages: self.backends.pages.as_ref(),
                    namespaces: &self.namespaces,
                    namespace,
                    match_mode: mode,
                };
                Ok(self.page_records(lookup.lookup(&self.query(substring, validated.limit))?))
            }
            Selector::ExternalUrl(alias) => {
                let lookup = ExternalUrlLookup {
                    fetcher: self.backends.external.as_ref(),
                    urls: &self.settings.urls,
                    alias,
                };
                let records = lookup.lookup(&self.query(substring, validated.limit))?;
                Ok(records.into_iter().map(ResultRecord::External).collect())
            }
            Selector::Empty => Ok(Vec::new()),
        }
    }

    fn query<'a>(&self, substring: Option<&'a str>, limit: usize) -> LookupQuery<'a> {
        LookupQuery {
            substring,
            limit,
            base: None,
        }
    }

    fn property_backend(&self) -> Result<(&dyn PropertyStore, SmwSchema)> {
        match (&self.backends.properties, self.settings.smw_schema) {
            (Some(store), Some(schema)) => Ok((store.as_ref(), schema)),
            _ => Err(AutocompleteError::BackingStoreUnavailable(
                "a semantic property store must be installed to query properties or concepts"
                    .to_string(),
            )),
        }
    }

    fn table_backend(&self) -> Result<&dyn TableStore> {
        match &self.backends.tables {
            Some(store) if self.settings.cargo_enabled => Ok(store.as_ref()),
            _ => Err(AutocompleteError::BackingStoreUnavailable(
                "a table store must be installed to query table fields".to_string(),
            )),
        }
    }

    fn page_records(&self, candidates: Vec<ValueCandidate>) -> Vec<ResultRecord> {
        if !self.settings.use_display_title {
            return plain_records(candidates);
        }
        disambiguate_labels(candidates)
            .into_iter()
            .map(|candidate| {
                let displaytitle = candidate
                    .label
                    .unwrap_or_else(|| candidate.value.clone());
                ResultRecord::Labeled {
                    title: candidate.value,
                    displaytitle,
                }
            })
            .collect()
    }
}

fn plain_records(candidates: Vec<ValueCandidate>) -> Vec<ResultRecord> {
    candidates
        .into_iter()
        .map(|candidate| ResultRecord::Title {
            title: candidate.value,
        })
        .collect()
}
