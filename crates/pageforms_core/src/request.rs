use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AutocompleteError, Result};

/// Raw request parameters, named as on the `pfautocomplete` API surface.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AutocompleteRequest {
    #[serde(default)]
    pub substr: String,
    pub property: Option<String>,
    pub category: Option<String>,
    pub concept: Option<String>,
    pub cargo_table: Option<String>,
    pub cargo_field: Option<String>,
    pub namespace: Option<String>,
    pub external_url: Option<String>,
    pub baseprop: Option<String>,
    pub base_cargo_table: Option<String>,
    pub base_cargo_field: Option<String>,
    pub basevalue: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseConstraint {
    pub field: BaseField,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseField {
    Property(String),
    TableField { table: String, field: String },
}

/// The one value source a request is routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    BasedProperty {
        property: String,
        base: BaseConstraint,
    },
    Property(String),
    Category(String),
    Concept(String),
    TableField {
        table: String,
        field: String,
        base: Option<BaseConstraint>,
    },
    Namespace(String),
    ExternalUrl(String),
    Empty,
}

impl Selector {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BasedProperty { .. } => "based_property",
            Self::Property(_) => "property",
            Self::Category(_) => "category",
            Self::Concept(_) => "concept",
            Self::TableField { .. } => "table_field",
            Self::Namespace(_) => "namespace",
            Self::ExternalUrl(_) => "external_url",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub selector: Selector,
    pub substring: String,
    pub limit: usize,
}

impl AutocompleteRequest {
    /// Check the substring rule and fix the selector by priority:
    /// based property, property, category, concept, table field, namespace,
    /// external URL.
    pub fn validate(self, max_values: usize) -> Result<ValidatedRequest> {
        let has_base = self.baseprop.is_some() || self.base_cargo_table.is_some();
        if !has_base && self.substr.is_empty() {
            return Err(AutocompleteError::MissingSubstring);
        }

        let limit = self
            .limit
            .unwrap_or(max_values)
            .clamp(1, max_values.max(1));
        let base_value = self.basevalue.unwrap_or_default();

        let selector = if let Some(baseprop) = self.baseprop {
            match self.property {
                Some(property) => Selector::BasedProperty {
                    property,
                    base: BaseConstraint {
                        field: BaseField::Property(baseprop),
                        value: base_value,
                    },
                },
                None => Selector::Empty,
            }
        } else if let Some(property) = self.property {
            Selector::Property(property)
        } else if let Some(category) = self.category {
            Selector::Category(category)
        } else if let Some(concept) = self.concept {
            Selector::Concept(concept)
        } else if let (Some(table), Some(field)) = (self.cargo_table, self.cargo_field) {
            let base = match (self.base_cargo_table, self.base_cargo_field) {
                (Some(base_table), Some(base_field)) => Some(BaseConstraint {
                    field: BaseField::TableField {
                        table: base_table,
                        field: base_field,
                    },
                    value: base_value,
                }),
                _ => None,
            };
            Selector::TableField { table, field, base }
        } else if let Some(namespace) = self.namespace {
            Selector::Namespace(namespace)
        } else if let Some(alias) = self.external_url {
            Selector::ExternalUrl(alias)
        } else {
            Selector::Empty
        };

        Ok(ValidatedRequest {
            selector,
            substring: self.substr,
            limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueCandidate {
    pub value: String,
    pub label: Option<String>,
}

impl ValueCandidate {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: None,
        }
    }

    pub fn labeled(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: Some(label.into()),
        }
    }
}

/// Inputs shared by every value source. `substring: None` means no filter.
#[derive(Debug, Clone, Copy)]
pub struct LookupQuery<'a> {
    pub substring: Option<&'a str>,
    pub limit: usize,
    pub base: Option<&'a BaseConstraint>,
}

pub trait ValueSource {
    type Item;

    fn lookup(&self, query: &LookupQuery<'_>) -> Result<Vec<Self::Item>>;
}

/// One client-visible result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultRecord {
    Labeled { title: String, displaytitle: String },
    Title { title: String },
    External(Map<String, Value>),
}
