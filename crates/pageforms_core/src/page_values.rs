use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::{AutocompleteError, Result};
use crate::predicate::MatchMode;
use crate::request::{LookupQuery, ValueCandidate, ValueSource};
use crate::title::{NS_CATEGORY, NS_CONCEPT, NamespaceTable, PageTitle};

/// Category levels searched: the category itself and two levels of subcategories.
pub const CATEGORY_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub title: PageTitle,
    pub display_title: Option<String>,
}

/// Substring filter on stored page titles.
#[derive(Debug, Clone, Copy)]
pub struct TitleFilter<'a> {
    pub substring: &'a str,
    pub mode: MatchMode,
}

pub trait PageDirectory: Send + Sync {
    /// Direct members of a category that are not categories themselves.
    fn category_members(
        &self,
        category_key: &str,
        filter: Option<&TitleFilter<'_>>,
        limit: usize,
    ) -> Result<Vec<PageEntry>>;
    /// Keys of the direct subcategories of a category.
    fn subcategories(&self, category_key: &str) -> Result<Vec<String>>;
    fn concept_members(
        &self,
        concept_key: &str,
        filter: Option<&TitleFilter<'_>>,
        limit: usize,
    ) -> Result<Vec<PageEntry>>;
    fn namespace_pages(
        &self,
        namespace: i32,
        filter: Option<&TitleFilter<'_>>,
        limit: usize,
    ) -> Result<Vec<PageEntry>>;
}

fn filter_for<'a>(query: &LookupQuery<'a>, mode: MatchMode) -> Option<TitleFilter<'a>> {
    query
        .substring
        .filter(|substring| !substring.is_empty())
        .map(|substring| TitleFilter { substring, mode })
}

fn candidate(entry: PageEntry, value: String) -> ValueCandidate {
    ValueCandidate {
        value,
        label: entry.display_title,
    }
}

/// Pages in a category and its subcategories.
pub struct CategoryLookup<'a> {
    pub pages: &'a dyn PageDirectory,
    pub namespaces: &'a NamespaceTable,
    pub category: &'a str,
    pub match_mode: MatchMode,
}

impl ValueSource for CategoryLookup<'_> {
    type Item = ValueCandidate;

    fn lookup(&self, query: &LookupQuery<'_>) -> Result<Vec<ValueCandidate>> {
        let filter = filter_for(query, self.match_mode);
        let name = strip_prefix(self.category, NS_CATEGORY, self.namespaces);
        let top = PageTitle::new(NS_CATEGORY, name).db_key();

        let mut found = BTreeMap::<String, ValueCandidate>::new();
        let mut visited = HashSet::from([top.clone()]);
        let mut level = VecDeque::from([top]);

        for depth in 0..CATEGORY_DEPTH {
            let mut next = VecDeque::new();
            while let Some(category) = level.pop_front() {
                if found.len() < query.limit {
                    let remaining = query.limit - found.len();
                    let members =
                        self.pages
                            .category_members(&category, filter.as_ref(), remaining)?;
                    for entry in members {
                        let value = entry.title.prefixed_text(self.namespaces);
                        found
                            .entry(value.clone())
                            .or_insert_with(|| candidate(entry, value));
                    }
                }
                if depth + 1 < CATEGORY_DEPTH {
                    for child in self.pages.subcategories(&category)? {
                        if visited.insert(child.clone()) {
                            next.push_back(child);
                        }
                    }
                }
            }
            level = next;
        }

        Ok(found.into_values().take(query.limit).collect())
    }
}

/// Pages cached as members of a semantic concept.
pub struct ConceptLookup<'a> {
    pub pages: &'a dyn PageDirectory,
    pub namespaces: &'a NamespaceTable,
    pub concept: &'a str,
    pub match_mode: MatchMode,
}

impl ValueSource for ConceptLookup<'_> {
    type Item = ValueCandidate;

    fn lookup(&self, query: &LookupQuery<'_>) -> Result<Vec<ValueCandidate>> {
        let filter = filter_for(query, self.match_mode);
        let name = strip_prefix(self.concept, NS_CONCEPT, self.namespaces);
        let key = PageTitle::new(NS_CONCEPT, name).db_key();
        let entries = self
            .pages
            .concept_members(&key, filter.as_ref(), query.limit)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let value = entry.title.prefixed_text(self.namespaces);
                candidate(entry, value)
            })
            .collect())
    }
}

/// Pages of one namespace, returned without the namespace prefix.
pub struct NamespaceLookup<'a> {
    pub pages: &'a dyn PageDirectory,
    pub namespaces: &'a NamespaceTable,
    pub namespace: &'a str,
    pub match_mode: MatchMode,
}

impl ValueSource for NamespaceLookup<'_> {
    type Item = ValueCandidate;

    fn lookup(&self, query: &LookupQuery<'_>) -> Result<Vec<ValueCandidate>> {
        let namespace = self.namespaces.id(self.namespace).ok_or_else(|| {
            AutocompleteError::InvalidSelector(format!("unknown namespace: {}", self.namespace))
        })?;
        let filter = filter_for(query, self.match_mode);
        let entries = self
            .pages
            .namespace_pages(namespace, filter.as_ref(), query.limit)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let value = entry.title.text.clone();
                candidate(entry, value)
            })
            .collect())
    }
}

/// `Category:Foo` and `Foo` name the same category.
fn strip_prefix<'a>(name: &'a str, namespace: i32, namespaces: &NamespaceTable) -> &'a str {
    if let Some((prefix, rest)) = name.split_once(':')
        && namespaces.id(prefix) == Some(namespace)
    {
        return rest;
    }
    name
}
