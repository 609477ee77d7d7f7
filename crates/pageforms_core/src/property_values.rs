use crate::cache::{CacheKey, CachePolicy};
use crate::error::{AutocompleteError, Result};
use crate::predicate::{Column, Condition, FieldRef, MatchMode, SqlFragment, substring_condition};
use crate::request::{BaseField, LookupQuery, ValueCandidate, ValueSource};
use crate::schema::{PAGE_TYPE_ID, SmwSchema};

pub trait PropertyStore: Send + Sync {
    /// Declared type id of a property, keyed by its underscored name.
    fn property_type(&self, property_key: &str) -> Result<Option<String>>;
    fn select_values(&self, query: &PropertyValueQuery) -> Result<Vec<String>>;
}

/// `SELECT DISTINCT value FROM ... WHERE ... ORDER BY value LIMIT n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValueQuery {
    pub from: String,
    pub value_column: Column,
    pub condition: Condition,
    pub limit: usize,
}

impl PropertyValueQuery {
    pub fn to_sql(&self) -> SqlFragment {
        let value = self.value_column.to_sql();
        let mut out = SqlFragment::default();
        out.sql
            .push_str(&format!("SELECT DISTINCT {value} FROM {} WHERE ", self.from));
        self.condition.render(&mut out);
        out.sql
            .push_str(&format!(" ORDER BY {value} LIMIT {}", self.limit));
        out
    }
}

/// Distinct values of one semantic property.
pub struct PropertyLookup<'a> {
    pub store: &'a dyn PropertyStore,
    pub schema: SmwSchema,
    pub property: &'a str,
    pub match_mode: MatchMode,
    pub cache: CachePolicy<'a>,
}

impl ValueSource for PropertyLookup<'_> {
    type Item = ValueCandidate;

    fn lookup(&self, query: &LookupQuery<'_>) -> Result<Vec<ValueCandidate>> {
        let property_key = to_property_key(self.property);
        let base = match query.base {
            Some(base) => match &base.field {
                BaseField::Property(name) => Some((to_property_key(name), base.value.as_str())),
                BaseField::TableField { .. } => {
                    return Err(AutocompleteError::InvalidSelector(
                        "a property lookup cannot be constrained by a table field".to_string(),
                    ));
                }
            },
            None => None,
        };
        // A base constraint replaces the substring filter.
        let substring = if base.is_some() { None } else { query.substring };

        let base_fields = base.as_ref().map(|(key, _)| [key.as_str()]);
        let base_part = base_fields
            .as_ref()
            .zip(base.as_ref())
            .map(|(fields, (_, value))| (&fields[..], *value));
        let key = CacheKey::new(
            "property",
            &[property_key.as_str()],
            substring.unwrap_or_default(),
            base_part,
            query.limit,
        );

        self.cache.lookup(&key, || {
            let is_page = self.is_page_property(&property_key)?;
            let statement = self.build_query(
                &property_key,
                is_page,
                substring,
                base.as_ref().map(|(key, value)| (key.as_str(), *value)),
                query.limit,
            )?;
            let values = self
                .store
                .select_values(&statement)?
                .into_iter()
                .map(|value| {
                    if is_page {
                        ValueCandidate::plain(value.replace('_', " "))
                    } else {
                        ValueCandidate::plain(value)
                    }
                })
                .collect();
            Ok(values)
        })
    }
}

impl PropertyLookup<'_> {
    fn is_page_property(&self, property_key: &str) -> Result<bool> {
        Ok(self.store.property_type(property_key)?.as_deref() == Some(PAGE_TYPE_ID))
    }

    fn build_query(
        &self,
        property_key: &str,
        is_page: bool,
        substring: Option<&str>,
        base: Option<(&str, &str)>,
        limit: usize,
    ) -> Result<PropertyValueQuery> {
        let ids = self.schema.ids_table();
        let (mut from, value_column) = if is_page {
            (
                format!(
                    "{} p JOIN {ids} p_ids ON p.p_id = p_ids.smw_id JOIN {ids} o_ids ON p.o_id = o_ids.smw_id",
                    self.schema.page_values_table()
                ),
                Column::new(Some("o_ids"), "smw_title")?,
            )
        } else {
            (
                format!(
                    "{} p JOIN {ids} p_ids ON p.p_id = p_ids.smw_id",
                    self.schema.literal_values_table()
                ),
                Column::new(Some("p"), self.schema.literal_value_column())?,
            )
        };

        let mut conditions = vec![Condition::Equals {
            column: Column::new(Some("p_ids"), "smw_title")?,
            value: property_key.to_string(),
        }];

        if let Some((base_key, base_value)) = base {
            conditions.push(Condition::Equals {
                column: Column::new(Some("base_p_ids"), "smw_title")?,
                value: base_key.to_string(),
            });
            if self.is_page_property(base_key)? {
                from.push_str(&format!(
                    " JOIN {} p_base ON p.s_id = p_base.s_id JOIN {ids} base_p_ids ON p_base.p_id = base_p_ids.smw_id JOIN {ids} base_o_ids ON p_base.o_id = base_o_ids.smw_id",
                    self.schema.page_values_table()
                ));
                conditions.push(Condition::Equals {
                    column: Column::new(Some("base_o_ids"), "smw_title")?,
                    value: base_value.replace(' ', "_"),
                });
            } else {
                from.push_str(&format!(
                    " JOIN {} p_base ON p.s_id = p_base.s_id JOIN {ids} base_p_ids ON p_base.p_id = base_p_ids.smw_id",
                    self.schema.literal_values_table()
                ));
                conditions.push(Condition::Equals {
                    column: Column::new(Some("p_base"), self.schema.literal_value_column())?,
                    value: base_value.to_string(),
                });
            }
        }

        if let Some(substring) = substring {
            // Page values are stored with underscores for spaces.
            let (substring, separator) = if is_page {
                (substring.replace(' ', "_"), '_')
            } else {
                (substring.to_string(), ' ')
            };
            conditions.push(substring_condition(
                &FieldRef::Column(value_column.clone()),
                &substring,
                self.match_mode,
                separator,
            ));
        }

        Ok(PropertyValueQuery {
            from,
            value_column,
            condition: Condition::All(conditions),
            limit,
        })
    }
}

fn to_property_key(name: &str) -> String {
    name.trim().replace(' ', "_")
}
