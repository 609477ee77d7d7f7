//! Table layout of the semantic property store.
//!
//! Two storage generations exist. The choice is made once, from the
//! configured store name, and every property query reads table and column
//! names from the resulting `SmwSchema`.

/// Type id of page-reference properties.
pub const PAGE_TYPE_ID: &str = "_wpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmwSchema {
    Store2,
    Store3,
}

impl SmwSchema {
    /// `None` for an empty name (no semantic store installed). Unknown names
    /// fall back to the current layout, as SPARQL stores mirror it.
    pub fn from_store_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.eq_ignore_ascii_case("SMWSQLStore2") {
            return Some(Self::Store2);
        }
        Some(Self::Store3)
    }

    pub fn ids_table(self) -> &'static str {
        match self {
            Self::Store2 => "smw_ids",
            Self::Store3 => "smw_object_ids",
        }
    }

    /// Holds page-reference values: `(s_id, p_id, o_id)`.
    pub fn page_values_table(self) -> &'static str {
        match self {
            Self::Store2 => "smw_rels2",
            Self::Store3 => "smw_di_wikipage",
        }
    }

    /// Holds literal values in `literal_value_column`.
    pub fn literal_values_table(self) -> &'static str {
        match self {
            Self::Store2 => "smw_atts2",
            Self::Store3 => "smw_di_blob",
        }
    }

    pub fn literal_value_column(self) -> &'static str {
        match self {
            Self::Store2 => "value_xsd",
            Self::Store3 => "o_hash",
        }
    }

    pub fn ddl(self) -> String {
        let ids = self.ids_table();
        let pages = self.page_values_table();
        let literals = self.literal_values_table();
        let literal_column = self.literal_value_column();
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {ids} (
    smw_id INTEGER PRIMARY KEY,
    smw_namespace INTEGER NOT NULL,
    smw_title TEXT NOT NULL,
    smw_iw TEXT NOT NULL DEFAULT '',
    smw_sortkey TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_{ids}_title ON {ids}(smw_title, smw_namespace);

CREATE TABLE IF NOT EXISTS {pages} (
    s_id INTEGER NOT NULL,
    p_id INTEGER NOT NULL,
    o_id INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_{pages}_p ON {pages}(p_id, o_id);

CREATE TABLE IF NOT EXISTS {literals} (
    s_id INTEGER NOT NULL,
    p_id INTEGER NOT NULL,
    {literal_column} TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_{literals}_p ON {literals}(p_id, {literal_column});

CREATE TABLE IF NOT EXISTS smw_fpt_type (
    smw_title TEXT PRIMARY KEY,
    type_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS smw_concept_cache (
    s_id INTEGER NOT NULL,
    o_id INTEGER NOT NULL
);
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::SmwSchema;

    #[test]
    fn store_names_resolve_once_to_a_layout() {
        assert_eq!(SmwSchema::from_store_name("SMWSQLStore2"), Some(SmwSchema::Store2));
        assert_eq!(SmwSchema::from_store_name("SMWSQLStore3"), Some(SmwSchema::Store3));
        assert_eq!(SmwSchema::from_store_name("SMWSPARQLStore"), Some(SmwSchema::Store3));
        assert_eq!(SmwSchema::from_store_name("  "), None);
    }

    #[test]
    fn layouts_name_distinct_tables() {
        assert_eq!(SmwSchema::Store2.literal_value_column(), "value_xsd");
        assert_eq!(SmwSchema::Store3.literal_value_column(), "o_hash");
        assert!(SmwSchema::Store3.ddl().contains("CREATE TABLE IF NOT EXISTS smw_di_wikipage"));
        assert!(SmwSchema::Store2.ddl().contains("CREATE TABLE IF NOT EXISTS smw_rels2"));
    }
}
