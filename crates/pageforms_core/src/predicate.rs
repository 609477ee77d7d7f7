//! Filter conditions for autocomplete queries.
//!
//! Conditions are built as a small tree and rendered to SQL with every value
//! bound as a parameter. Substrings never reach the SQL text: LIKE patterns
//! escape `%`, `_` and `\` and are matched with `ESCAPE '\'`.
//!
//! Matching is case-insensitive beyond ASCII: both sides are folded with
//! [`LOWER_FUNCTION`], which every store connection must register.

use crate::error::{AutocompleteError, Result};

/// SQL scalar function folding text to Unicode lowercase.
pub const LOWER_FUNCTION: &str = "pf_lower";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// `%substring%`
    Anywhere,
    /// `substring%` or a word inside the value starting with the substring.
    PrefixOrWord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub table: Option<String>,
    pub name: String,
}

impl Column {
    pub fn new(table: Option<&str>, name: &str) -> Result<Self> {
        if let Some(table) = table {
            validate_identifier(table)?;
        }
        validate_identifier(name)?;
        Ok(Self {
            table: table.map(str::to_string),
            name: name.to_string(),
        })
    }

    pub fn to_sql(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}", quote_identifier(table), quote_identifier(&self.name)),
            None => quote_identifier(&self.name),
        }
    }
}

/// What a substring is matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Column(Column),
    /// A multi-valued field: each value lives in `helper_table._value`,
    /// keyed back to `row_id` through `helper_table._rowID`.
    List { row_id: Column, helper_table: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Like { column: Column, pattern: String },
    HoldsLike {
        row_id: Column,
        helper_table: String,
        pattern: String,
    },
    Equals { column: Column, value: String },
    SameValue(Column, Column),
    Any(Vec<Condition>),
    All(Vec<Condition>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<String>,
}

impl Condition {
    pub fn like(field: &FieldRef, pattern: String) -> Self {
        match field {
            FieldRef::Column(column) => Self::Like {
                column: column.clone(),
                pattern,
            },
            FieldRef::List {
                row_id,
                helper_table,
            } => Self::HoldsLike {
                row_id: row_id.clone(),
                helper_table: helper_table.clone(),
                pattern,
            },
        }
    }

    pub fn render(&self, out: &mut SqlFragment) {
        match self {
            Self::Like { column, pattern } => {
                out.params.push(pattern.clone());
                out.sql.push_str(&format!(
                    "{LOWER_FUNCTION}({}) LIKE ?{} ESCAPE '\\'",
                    column.to_sql(),
                    out.params.len()
                ));
            }
            Self::HoldsLike {
                row_id,
                helper_table,
                pattern,
            } => {
                out.params.push(pattern.clone());
                out.sql.push_str(&format!(
                    "{} IN (SELECT \"_rowID\" FROM {} WHERE {LOWER_FUNCTION}(\"_value\") LIKE ?{} ESCAPE '\\')",
                    row_id.to_sql(),
                    quote_identifier(helper_table),
                    out.params.len()
                ));
            }
            Self::Equals { column, value } => {
                out.params.push(value.clone());
                out.sql
                    .push_str(&format!("{} = ?{}", column.to_sql(), out.params.len()));
            }
            Self::SameValue(left, right) => {
                out.sql
                    .push_str(&format!("{} = {}", left.to_sql(), right.to_sql()));
            }
            Self::Any(children) => render_group(children, " OR ", "0", out),
            Self::All(children) => render_group(children, " AND ", "1", out),
        }
    }

    pub fn to_sql(&self) -> SqlFragment {
        let mut out = SqlFragment::default();
        self.render(&mut out);
        out
    }
}

fn render_group(children: &[Condition], joiner: &str, empty: &str, out: &mut SqlFragment) {
    if children.is_empty() {
        out.sql.push_str(empty);
        return;
    }
    out.sql.push('(');
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            out.sql.push_str(joiner);
        }
        child.render(out);
    }
    out.sql.push(')');
}

/// Build the autocomplete filter for `field`.
///
/// `word_separator` is the character that precedes a word inside stored
/// values: a space for literal values, `_` for page references. The pattern
/// is lowercased to match the folded column.
pub fn substring_condition(
    field: &FieldRef,
    substring: &str,
    mode: MatchMode,
    word_separator: char,
) -> Condition {
    let escaped = escape_like(&substring.to_lowercase());
    match mode {
        MatchMode::Anywhere => Condition::like(field, format!("%{escaped}%")),
        MatchMode::PrefixOrWord => {
            let separator = escape_like(&word_separator.to_string());
            Condition::Any(vec![
                Condition::like(field, format!("{escaped}%")),
                Condition::like(field, format!("%{separator}{escaped}%")),
            ])
        }
    }
}

pub fn escape_like(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            output.push('\\');
        }
        output.push(ch);
    }
    output
}

/// Letters, digits and underscores only; rejects anything that could change query structure.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
        return Err(AutocompleteError::InvalidSelector(format!(
            "invalid identifier: {name:?}"
        )));
    }
    Ok(())
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
