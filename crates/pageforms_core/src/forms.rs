//! Which form edits a page.
//!
//! Resolution stops at the first rule that yields an answer: the page's own
//! override, then the defaults of its categories, then (for non-subpages) the
//! default of its namespace. Namespace defaults are memoized in a
//! [`NamespaceFormCache`] until purged.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::PageFormsConfig;
use crate::title::{NS_CATEGORY, NS_MAIN, NS_PROJECT, NamespaceTable, PageTitle};

static NAMESPACE_FORMS: OnceLock<NamespaceFormCache> = OnceLock::new();

pub trait FormStore: Send + Sync {
    /// The page's own default-form property. `Some("")` is an explicit "no form".
    fn default_form(&self, page: &PageTitle) -> Result<Option<String>>;
    /// Category names (without prefix) the page belongs to.
    fn categories(&self, page: &PageTitle) -> Result<Vec<String>>;
    /// Form named by the page schema attached to a category, if any.
    fn schema_form(&self, category: &str) -> Result<Option<String>>;
}

/// Namespace id to default form. The first stored answer for a namespace
/// stands until it is purged.
#[derive(Debug, Default)]
pub struct NamespaceFormCache {
    forms: RwLock<HashMap<i32, Option<String>>>,
}

impl NamespaceFormCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance.
    pub fn global() -> &'static Self {
        NAMESPACE_FORMS.get_or_init(Self::new)
    }

    /// `None` when the namespace has not been resolved yet.
    pub fn get(&self, namespace: i32) -> Option<Option<String>> {
        self.forms.read().ok()?.get(&namespace).cloned()
    }

    /// Store `form` unless an answer is already present; returns the stored answer.
    pub fn insert(&self, namespace: i32, form: Option<String>) -> Option<String> {
        let Ok(mut forms) = self.forms.write() else {
            return form;
        };
        forms.entry(namespace).or_insert(form).clone()
    }

    pub fn purge_namespace(&self, namespace: i32) {
        if let Ok(mut forms) = self.forms.write() {
            forms.remove(&namespace);
        }
    }

    /// Drop every memoized namespace, e.g. after namespace labels change.
    pub fn purge(&self) {
        if let Ok(mut forms) = self.forms.write() {
            forms.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.forms.read().map(|forms| forms.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct FormResolver<'a> {
    store: &'a dyn FormStore,
    config: &'a PageFormsConfig,
    namespaces: &'a NamespaceTable,
    cache: &'a NamespaceFormCache,
}

impl<'a> FormResolver<'a> {
    pub fn new(
        store: &'a dyn FormStore,
        config: &'a PageFormsConfig,
        namespaces: &'a NamespaceTable,
    ) -> Self {
        Self {
            store,
            config,
            namespaces,
            cache: NamespaceFormCache::global(),
        }
    }

    pub fn with_cache(mut self, cache: &'a NamespaceFormCache) -> Self {
        self.cache = cache;
        self
    }

    /// Forms for `page`, in category order, without duplicates.
    pub fn resolve_forms(&self, page: &PageTitle) -> Vec<String> {
        if !page.is_category() {
            match self.page_default(page) {
                Some(form) if form.is_empty() => return Vec::new(),
                Some(form) => return vec![form],
                None => {}
            }

            let mut forms = Vec::<String>::new();
            for category in self.categories(page) {
                if let Some(form) = self.category_form(&category)
                    && !forms.contains(&form)
                {
                    forms.push(form);
                }
            }
            if !forms.is_empty() {
                return forms;
            }
        }

        if self.is_subpage(page) {
            return Vec::new();
        }

        self.default_form_for_namespace(page.namespace)
            .into_iter()
            .collect()
    }

    /// Default form of a namespace, read from the Project page named after it.
    pub fn default_form_for_namespace(&self, namespace: i32) -> Option<String> {
        if let Some(form) = self.cache.get(namespace) {
            return form;
        }

        let label = if namespace == NS_MAIN {
            Some(self.config.blank_namespace_label())
        } else {
            self.namespaces.label(namespace)
        };
        let form = match label {
            Some(label) if !label.trim().is_empty() => self
                .page_default(&PageTitle::new(NS_PROJECT, label))
                .filter(|form| !form.is_empty()),
            _ => None,
        };
        debug!(namespace, form = form.as_deref(), "memoizing namespace default form");
        self.cache.insert(namespace, form)
    }

    pub fn is_subpage(&self, page: &PageTitle) -> bool {
        page.is_subpage() && self.config.namespace_has_subpages(page.namespace)
    }

    fn category_form(&self, category: &str) -> Option<String> {
        let schema_form = self
            .store
            .schema_form(category)
            .unwrap_or_else(|error| absent("page schema", category, &error));
        if let Some(form) = schema_form.filter(|form| !form.is_empty()) {
            return Some(form);
        }
        let category_page = PageTitle::new(NS_CATEGORY, category);
        self.page_default(&category_page)
            .filter(|form| !form.is_empty())
    }

    fn page_default(&self, page: &PageTitle) -> Option<String> {
        self.store
            .default_form(page)
            .unwrap_or_else(|error| absent("default form", &page.text, &error))
    }

    fn categories(&self, page: &PageTitle) -> Vec<String> {
        self.store
            .categories(page)
            .unwrap_or_else(|error| absent("categories", &page.text, &error))
    }
}

fn absent<T: Default>(what: &str, subject: &str, error: &anyhow::Error) -> T {
    warn!(subject, "failed to read {what}: {error:#}");
    T::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::database;
    use crate::store::{
        DEFAULT_FORM_PROPERTY, LEGACY_DEFAULT_FORM_PROPERTY, PAGE_SCHEMA_PROPERTY, WikiDatabase,
    };

    fn category_with_form(database: &WikiDatabase, category: &str, form: &str) {
        let id = database.add_page(NS_CATEGORY, category);
        database.set_page_prop(id, DEFAULT_FORM_PROPERTY, form);
    }

    fn resolve(database: &WikiDatabase, config: &PageFormsConfig, page: &PageTitle) -> Vec<String> {
        let namespaces = NamespaceTable::default();
        let cache = NamespaceFormCache::new();
        FormResolver::new(database, config, &namespaces)
            .with_cache(&cache)
            .resolve_forms(page)
    }

    #[test]
    fn shared_category_forms_are_deduplicated() {
        let (_temp, database) = database(None);
        let config = PageFormsConfig::default();
        category_with_form(&database, "Bar", "BarForm");
        category_with_form(&database, "Baz", "BarForm");
        let foo = database.add_page(0, "Foo");
        database.add_category(foo, "Bar");
        database.add_category(foo, "Baz");

        let page = PageTitle::new(0, "Foo");
        assert_eq!(resolve(&database, &config, &page), vec!["BarForm"]);
        assert_eq!(
            resolve(&database, &config, &page),
            resolve(&database, &config, &page)
        );
    }

    #[test]
    fn page_override_wins_and_empty_override_cancels() {
        let (_temp, database) = database(None);
        let config = PageFormsConfig::default();
        category_with_form(&database, "Bar", "BarForm");

        let own = database.add_page(0, "Own");
        database.add_category(own, "Bar");
        database.set_page_prop(own, LEGACY_DEFAULT_FORM_PROPERTY, "OwnForm");
        assert_eq!(
            resolve(&database, &config, &PageTitle::new(0, "Own")),
            vec!["OwnForm"]
        );

        let cancelled = database.add_page(0, "Cancelled");
        database.add_category(cancelled, "Bar");
        database.set_page_prop(cancelled, DEFAULT_FORM_PROPERTY, "");
        assert!(resolve(&database, &config, &PageTitle::new(0, "Cancelled")).is_empty());
    }

    #[test]
    fn schema_form_takes_precedence_within_a_category() {
        let (_temp, database) = database(None);
        let config = PageFormsConfig::default();
        category_with_form(&database, "Books", "BookForm");
        let category = database.add_page(NS_CATEGORY, "Books");
        database.set_page_prop(
            category,
            PAGE_SCHEMA_PROPERTY,
            r#"<PageSchema><Form name="SchemaBook"/></PageSchema>"#,
        );
        category_with_form(&database, "Novels", "NovelForm");
        let page = database.add_page(0, "Dune");
        database.add_category(page, "Books");
        database.add_category(page, "Novels");

        assert_eq!(
            resolve(&database, &config, &PageTitle::new(0, "Dune")),
            vec!["SchemaBook", "NovelForm"]
        );
    }

    #[test]
    fn subpages_never_inherit_the_namespace_default() {
        let (_temp, database) = database(None);
        let config = PageFormsConfig::default();
        let project = database.add_page(NS_PROJECT, "User");
        database.set_page_prop(project, DEFAULT_FORM_PROPERTY, "UserForm");

        assert_eq!(
            resolve(&database, &config, &PageTitle::new(2, "Alice")),
            vec!["UserForm"]
        );
        assert!(resolve(&database, &config, &PageTitle::new(2, "Alice/Sandbox")).is_empty());
    }

    #[test]
    fn main_namespace_uses_blank_label_and_slashes_are_plain_titles() {
        let (_temp, database) = database(None);
        let config = PageFormsConfig::default();
        let project = database.add_page(NS_PROJECT, "Main");
        database.set_page_prop(project, DEFAULT_FORM_PROPERTY, "ArticleForm");

        assert_eq!(
            resolve(&database, &config, &PageTitle::new(0, "AC/DC")),
            vec!["ArticleForm"]
        );
    }

    #[test]
    fn namespace_default_is_memoized_until_purged() {
        let (_temp, database) = database(None);
        let config = PageFormsConfig::default();
        let namespaces = NamespaceTable::default();
        let cache = NamespaceFormCache::new();
        let resolver = FormResolver::new(&database, &config, &namespaces).with_cache(&cache);

        assert_eq!(resolver.default_form_for_namespace(10), None);
        let project = database.add_page(NS_PROJECT, "Template");
        database.set_page_prop(project, DEFAULT_FORM_PROPERTY, "TemplateForm");
        assert_eq!(resolver.default_form_for_namespace(10), None);

        cache.purge_namespace(10);
        assert_eq!(
            resolver.default_form_for_namespace(10).as_deref(),
            Some("TemplateForm")
        );
        assert_eq!(resolver.default_form_for_namespace(9999), None);
        assert_eq!(cache.len(), 2);
        cache.purge();
        assert!(cache.is_empty());
    }

    #[test]
    fn first_writer_wins() {
        let cache = NamespaceFormCache::new();
        assert_eq!(cache.insert(0, Some("A".to_string())).as_deref(), Some("A"));
        assert_eq!(cache.insert(0, Some("B".to_string())).as_deref(), Some("A"));
        assert_eq!(cache.get(0), Some(Some("A".to_string())));
        assert_eq!(cache.get(1), None);
    }

    #[test]
    fn storage_faults_fall_through_to_nothing() {
        let database = WikiDatabase::new("/nonexistent/dir/wiki.db", None);
        let config = PageFormsConfig::default();
        assert!(resolve(&database, &config, &PageTitle::new(0, "Foo")).is_empty());
    }
}
