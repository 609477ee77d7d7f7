use std::collections::BTreeMap;

use crate::cache::{CacheKey, CachePolicy};
use crate::error::{AutocompleteError, Result};
use crate::predicate::{
    Column, Condition, FieldRef, MatchMode, SqlFragment, quote_identifier, substring_condition,
    validate_identifier,
};
use crate::request::{BaseField, LookupQuery, ValueCandidate, ValueSource};

/// One result row keyed by column alias.
pub type TableRow = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescription {
    pub is_list: bool,
}

pub trait TableStore: Send + Sync {
    /// `None` when the table or the field is not declared.
    fn field_description(&self, table: &str, field: &str) -> Result<Option<FieldDescription>>;
    fn run(&self, query: &TableQuery) -> Result<Vec<TableRow>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectField {
    pub column: Column,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub tables: Vec<String>,
    pub fields: Vec<SelectField>,
    pub join_on: Vec<Condition>,
    pub condition: Condition,
    pub group_by: Option<Column>,
    pub having: Option<Condition>,
    pub order_by: Option<Column>,
    pub limit: usize,
    pub offset: usize,
}

impl TableQuery {
    pub fn to_sql(&self) -> SqlFragment {
        let mut out = SqlFragment::default();
        let fields = self
            .fields
            .iter()
            .map(|field| format!("{} AS {}", field.column.to_sql(), quote_identifier(&field.alias)))
            .collect::<Vec<_>>()
            .join(", ");
        let tables = self
            .tables
            .iter()
            .map(|table| quote_identifier(table))
            .collect::<Vec<_>>()
            .join(", ");
        out.sql
            .push_str(&format!("SELECT {fields} FROM {tables} WHERE "));

        let mut where_parts = self.join_on.clone();
        where_parts.push(self.condition.clone());
        Condition::All(where_parts).render(&mut out);

        if let Some(group_by) = &self.group_by {
            out.sql.push_str(&format!(" GROUP BY {}", group_by.to_sql()));
        }
        if let Some(having) = &self.having {
            out.sql.push_str(" HAVING ");
            having.render(&mut out);
        }
        if let Some(order_by) = &self.order_by {
            out.sql.push_str(&format!(" ORDER BY {}", order_by.to_sql()));
        }
        out.sql
            .push_str(&format!(" LIMIT {} OFFSET {}", self.limit, self.offset));
        out
    }
}

/// Physical table holding rows of a declared table.
pub fn physical_table(table: &str) -> String {
    format!("cargo__{table}")
}

/// Helper table holding the individual values of a list field.
pub fn list_helper_table(table: &str, field: &str) -> String {
    format!("cargo__{table}___{field}")
}

/// Result key of a field: underscores read as spaces unless the field is
/// an internal one.
pub fn field_alias(field: &str) -> String {
    if field.starts_with('_') {
        field.to_string()
    } else {
        field.replace('_', " ")
    }
}

/// Distinct values of one field of a declared table.
pub struct TableLookup<'a> {
    pub store: &'a dyn TableStore,
    pub table: &'a str,
    pub field: &'a str,
    pub match_mode: MatchMode,
    pub cache: CachePolicy<'a>,
}

impl ValueSource for TableLookup<'_> {
    type Item = ValueCandidate;

    fn lookup(&self, query: &LookupQuery<'_>) -> Result<Vec<ValueCandidate>> {
        validate_identifier(self.table)?;
        validate_identifier(self.field)?;
        let base = match query.base {
            Some(base) => match &base.field {
                BaseField::TableField { table, field } => {
                    validate_identifier(table)?;
                    validate_identifier(field)?;
                    Some((table.as_str(), field.as_str(), base.value.as_str()))
                }
                BaseField::Property(_) => {
                    return Err(AutocompleteError::InvalidSelector(
                        "a table lookup cannot be constrained by a property".to_string(),
                    ));
                }
            },
            None => None,
        };

        let substring = query.substring.unwrap_or_default();
        let base_fields = base.map(|(table, field, _)| [table, field]);
        let base_part = base_fields
            .as_ref()
            .zip(base)
            .map(|(fields, (_, _, value))| (&fields[..], value));
        let key = CacheKey::new(
            "table_field",
            &[self.table, self.field],
            substring,
            base_part,
            query.limit,
        );

        self.cache.lookup(&key, || {
            let statement = self.build_query(query.substring, base, query.limit)?;
            let alias = field_alias(self.field);
            let values = self
                .store
                .run(&statement)?
                .into_iter()
                .filter_map(|mut row| row.remove(&alias))
                .filter(|value| !value.is_empty())
                .map(ValueCandidate::plain)
                .collect();
            Ok(values)
        })
    }
}

impl TableLookup<'_> {
    fn describe(&self, table: &str, field: &str) -> Result<FieldDescription> {
        self.store.field_description(table, field)?.ok_or_else(|| {
            AutocompleteError::InvalidSelector(format!("unknown table field {table}.{field}"))
        })
    }

    fn build_query(
        &self,
        substring: Option<&str>,
        base: Option<(&str, &str, &str)>,
        limit: usize,
    ) -> Result<TableQuery> {
        let description = self.describe(self.table, self.field)?;
        let main = physical_table(self.table);
        let value_column = Column::new(Some(&main), self.field)?;

        let mut tables = vec![main.clone()];
        let mut join_on = Vec::new();
        let mut conditions = Vec::new();

        if let Some((base_table, base_field, base_value)) = base {
            self.describe(base_table, base_field)?;
            let base_physical = physical_table(base_table);
            if base_table != self.table {
                join_on.push(Condition::SameValue(
                    Column::new(Some(&main), "_pageName")?,
                    Column::new(Some(&base_physical), "_pageName")?,
                ));
                tables.push(base_physical.clone());
            }
            conditions.push(Condition::Equals {
                column: Column::new(Some(&base_physical), base_field)?,
                value: base_value.to_string(),
            });
        }

        if let Some(substring) = substring.filter(|substring| !substring.is_empty()) {
            let field = if description.is_list {
                FieldRef::List {
                    row_id: Column::new(Some(&main), "_ID")?,
                    helper_table: list_helper_table(self.table, self.field),
                }
            } else {
                FieldRef::Column(value_column.clone())
            };
            conditions.push(substring_condition(&field, substring, self.match_mode, ' '));
        }

        Ok(TableQuery {
            tables,
            fields: vec![SelectField {
                column: value_column.clone(),
                alias: field_alias(self.field),
            }],
            join_on,
            condition: Condition::All(conditions),
            group_by: Some(value_column.clone()),
            having: None,
            order_by: Some(value_column),
            limit,
            offset: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::BaseConstraint;
    use crate::store::fixtures::database;

    fn lookup<'a>(store: &'a dyn TableStore, table: &'a str, field: &'a str) -> TableLookup<'a> {
        TableLookup {
            store,
            table,
            field,
            match_mode: MatchMode::PrefixOrWord,
            cache: CachePolicy::disabled(),
        }
    }

    fn values(candidates: Vec<ValueCandidate>) -> Vec<String> {
        candidates.into_iter().map(|candidate| candidate.value).collect()
    }

    fn query(substring: &str) -> LookupQuery<'_> {
        LookupQuery {
            substring: Some(substring),
            limit: 50,
            base: None,
        }
    }

    #[test]
    fn list_fields_match_individual_values() {
        let (_temp, database) = database(None);
        database.declare_cargo_table("Books", &[("Genre", true)]);
        database.insert_cargo_row("Books", "Dune", &[("Genre", "Science Fiction, Drama")]);
        database.insert_cargo_row("Books", "Emma", &[("Genre", "Classics")]);
        database.insert_cargo_row("Books", "Blank", &[("Genre", "")]);

        let found = lookup(&database, "Books", "Genre")
            .lookup(&query("sci"))
            .expect("lookup");
        assert_eq!(values(found), vec!["Science Fiction, Drama"]);

        let found = lookup(&database, "Books", "Genre")
            .lookup(&query("dra"))
            .expect("lookup");
        assert_eq!(values(found), vec!["Science Fiction, Drama"]);
    }

    #[test]
    fn scalar_fields_are_grouped_and_ordered() {
        let (_temp, database) = database(None);
        database.declare_cargo_table("Books", &[("Author", false)]);
        database.insert_cargo_row("Books", "Foundation", &[("Author", "Isaac Asimov")]);
        database.insert_cargo_row("Books", "I, Robot", &[("Author", "Isaac Asimov")]);
        database.insert_cargo_row("Books", "Ilium", &[("Author", "Dan Simmons")]);

        let found = lookup(&database, "Books", "Author")
            .lookup(&query("i"))
            .expect("lookup");
        assert_eq!(values(found), vec!["Isaac Asimov"]);

        let found = lookup(&database, "Books", "Author")
            .lookup(&LookupQuery {
                substring: None,
                limit: 50,
                base: None,
            })
            .expect("lookup");
        assert_eq!(values(found), vec!["Dan Simmons", "Isaac Asimov"]);
    }

    #[test]
    fn underscored_fields_are_read_through_their_alias() {
        let (_temp, database) = database(None);
        database.declare_cargo_table("Books", &[("Original_title", false)]);
        database.insert_cargo_row("Books", "Dune", &[("Original_title", "Dune")]);
        let found = lookup(&database, "Books", "Original_title")
            .lookup(&query("du"))
            .expect("lookup");
        assert_eq!(values(found), vec!["Dune"]);
        assert_eq!(field_alias("Original_title"), "Original title");
        assert_eq!(field_alias("_pageName"), "_pageName");
    }

    #[test]
    fn base_field_in_another_table_joins_on_page_name() {
        let (_temp, database) = database(None);
        database.declare_cargo_table("Books", &[("Title", false)]);
        database.declare_cargo_table("Authors", &[("Country", false)]);
        database.insert_cargo_row("Books", "Asimov", &[("Title", "Foundation")]);
        database.insert_cargo_row("Authors", "Asimov", &[("Country", "USA")]);
        database.insert_cargo_row("Books", "Verne", &[("Title", "Five Weeks in a Balloon")]);
        database.insert_cargo_row("Authors", "Verne", &[("Country", "France")]);

        let base = BaseConstraint {
            field: BaseField::TableField {
                table: "Authors".to_string(),
                field: "Country".to_string(),
            },
            value: "USA".to_string(),
        };
        let found = lookup(&database, "Books", "Title")
            .lookup(&LookupQuery {
                substring: Some("f"),
                limit: 50,
                base: Some(&base),
            })
            .expect("lookup");
        assert_eq!(values(found), vec!["Foundation"]);
    }

    #[test]
    fn base_field_in_same_table_filters_in_place() {
        let (_temp, database) = database(None);
        database.declare_cargo_table("Books", &[("Title", false), ("Author", false)]);
        database.insert_cargo_row(
            "Books",
            "Foundation",
            &[("Title", "Foundation"), ("Author", "Isaac Asimov")],
        );
        database.insert_cargo_row(
            "Books",
            "Fahrenheit 451",
            &[("Title", "Fahrenheit 451"), ("Author", "Ray Bradbury")],
        );

        let base = BaseConstraint {
            field: BaseField::TableField {
                table: "Books".to_string(),
                field: "Author".to_string(),
            },
            value: "Ray Bradbury".to_string(),
        };
        let found = lookup(&database, "Books", "Title")
            .lookup(&LookupQuery {
                substring: Some("f"),
                limit: 50,
                base: Some(&base),
            })
            .expect("lookup");
        assert_eq!(values(found), vec!["Fahrenheit 451"]);

        let statement = lookup(&database, "Books", "Title")
            .build_query(Some("f"), Some(("Books", "Author", "Ray Bradbury")), 50)
            .expect("query");
        assert_eq!(statement.tables, vec!["cargo__Books".to_string()]);
        assert!(statement.join_on.is_empty());
    }

    #[test]
    fn unknown_fields_and_bad_identifiers_are_invalid_selectors() {
        let (_temp, database) = database(None);
        database.declare_cargo_table("Books", &[("Genre", true)]);
        let error = lookup(&database, "Books", "Nope")
            .lookup(&query("x"))
            .expect_err("must fail");
        assert!(matches!(error, AutocompleteError::InvalidSelector(_)));

        let error = lookup(&database, "Books\" --", "Genre")
            .lookup(&query("x"))
            .expect_err("must fail");
        assert!(matches!(error, AutocompleteError::InvalidSelector(_)));
    }

    #[test]
    fn query_shape_renders_every_clause() {
        let column = Column::new(Some("cargo__Books"), "Genre").expect("column");
        let statement = TableQuery {
            tables: vec!["cargo__Books".to_string()],
            fields: vec![SelectField {
                column: column.clone(),
                alias: "Genre".to_string(),
            }],
            join_on: Vec::new(),
            condition: Condition::All(Vec::new()),
            group_by: Some(column.clone()),
            having: None,
            order_by: Some(column),
            limit: 5,
            offset: 10,
        };
        assert_eq!(
            statement.to_sql().sql,
            "SELECT \"cargo__Books\".\"Genre\" AS \"Genre\" FROM \"cargo__Books\" WHERE (1) GROUP BY \"cargo__Books\".\"Genre\" ORDER BY \"cargo__Books\".\"Genre\" LIMIT 5 OFFSET 10"
        );
    }
}
