use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result as AnyResult};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::error::{AutocompleteError, Result};
use crate::forms::FormStore;
use crate::page_values::{PageDirectory, PageEntry, TitleFilter};
use crate::predicate::{
    Column, Condition, FieldRef, LOWER_FUNCTION, SqlFragment, substring_condition,
};
use crate::property_values::{PropertyStore, PropertyValueQuery};
use crate::red_links::{PageCreationJob, PageCreationQueue};
use crate::schema::SmwSchema;
use crate::table_values::{FieldDescription, TableQuery, TableRow, TableStore};
use crate::title::{NS_CATEGORY, NS_CONCEPT, PageTitle};

pub const DEFAULT_FORM_PROPERTY: &str = "PFDefaultForm";
pub const LEGACY_DEFAULT_FORM_PROPERTY: &str = "SFDefaultForm";
pub const DISPLAY_TITLE_PROPERTY: &str = "displaytitle";
pub const PAGE_SCHEMA_PROPERTY: &str = "PSXML";
pub const CREATE_PAGE_JOB: &str = "pageFormsCreatePage";

const CORE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS page (
    page_id INTEGER PRIMARY KEY,
    page_namespace INTEGER NOT NULL,
    page_title TEXT NOT NULL,
    UNIQUE (page_namespace, page_title)
);

CREATE TABLE IF NOT EXISTS categorylinks (
    cl_from INTEGER NOT NULL,
    cl_to TEXT NOT NULL,
    PRIMARY KEY (cl_from, cl_to)
);
CREATE INDEX IF NOT EXISTS idx_categorylinks_to ON categorylinks(cl_to);

CREATE TABLE IF NOT EXISTS page_props (
    pp_page INTEGER NOT NULL,
    pp_propname TEXT NOT NULL,
    pp_value TEXT NOT NULL,
    PRIMARY KEY (pp_page, pp_propname)
);

CREATE TABLE IF NOT EXISTS user (
    user_id INTEGER PRIMARY KEY,
    user_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS job (
    job_id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_cmd TEXT NOT NULL,
    job_namespace INTEGER NOT NULL,
    job_title TEXT NOT NULL,
    job_params TEXT NOT NULL,
    job_timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS cargo_tables (
    main_table TEXT NOT NULL,
    field_name TEXT NOT NULL,
    is_list INTEGER NOT NULL DEFAULT 0,
    delimiter TEXT NOT NULL DEFAULT ',',
    PRIMARY KEY (main_table, field_name)
);
"#;

/// SQLite database laid out like a wiki with the semantic and tabular stores
/// installed. Opens a connection per call.
#[derive(Debug, Clone)]
pub struct WikiDatabase {
    db_path: PathBuf,
    smw_schema: Option<SmwSchema>,
}

impl WikiDatabase {
    pub fn new(db_path: impl Into<PathBuf>, smw_schema: Option<SmwSchema>) -> Self {
        Self {
            db_path: db_path.into(),
            smw_schema,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn initialize(&self) -> AnyResult<()> {
        let parent = self
            .db_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("db path has no parent: {}", self.db_path.display()))?;
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create database parent directory {}",
                parent.display()
            )
        })?;
        let connection = open_connection(&self.db_path)?;
        connection
            .execute_batch(CORE_SCHEMA_SQL)
            .context("failed to initialize wiki schema")?;
        if let Some(schema) = self.smw_schema {
            connection
                .execute_batch(&schema.ddl())
                .context("failed to initialize semantic store schema")?;
        }
        Ok(())
    }

    fn open_existing(&self) -> AnyResult<Connection> {
        if !self.db_path.exists() {
            anyhow::bail!("database not found: {}", self.db_path.display());
        }
        open_connection(&self.db_path)
    }

    fn connect(&self) -> Result<Connection> {
        if !self.db_path.exists() {
            return Err(AutocompleteError::BackingStoreUnavailable(format!(
                "database not found: {}",
                self.db_path.display()
            )));
        }
        open_connection(&self.db_path)
            .map_err(|error| AutocompleteError::BackingStoreUnavailable(format!("{error:#}")))
    }

    fn require_smw(&self) -> Result<SmwSchema> {
        self.smw_schema.ok_or_else(|| {
            AutocompleteError::BackingStoreUnavailable(
                "no semantic store is configured".to_string(),
            )
        })
    }

    fn page_id(connection: &Connection, page: &PageTitle) -> AnyResult<Option<i64>> {
        connection
            .query_row(
                "SELECT page_id FROM page WHERE page_namespace = ?1 AND page_title = ?2",
                params![page.namespace, page.db_key()],
                |row| row.get(0),
            )
            .optional()
            .context("failed to look up page id")
    }
}

impl PropertyStore for WikiDatabase {
    fn property_type(&self, property_key: &str) -> Result<Option<String>> {
        self.require_smw()?;
        let connection = self.connect()?;
        let type_id = connection
            .query_row(
                "SELECT type_id FROM smw_fpt_type WHERE smw_title = ?1",
                [property_key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(type_id)
    }

    fn select_values(&self, query: &PropertyValueQuery) -> Result<Vec<String>> {
        let connection = self.connect()?;
        let fragment = query.to_sql();
        let mut statement = connection.prepare(&fragment.sql)?;
        let mut rows = statement.query(params_from_iter(fragment.params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(value) = cell_to_string(row, 0)? {
                out.push(value);
            }
        }
        Ok(out)
    }
}

impl TableStore for WikiDatabase {
    fn field_description(&self, table: &str, field: &str) -> Result<Option<FieldDescription>> {
        let connection = self.connect()?;
        let description = connection
            .query_row(
                "SELECT is_list FROM cargo_tables WHERE main_table = ?1 AND field_name = ?2",
                params![table, field],
                |row| {
                    Ok(FieldDescription {
                        is_list: row.get::<_, i64>(0)? == 1,
                    })
                },
            )
            .optional()?;
        Ok(description)
    }

    fn run(&self, query: &TableQuery) -> Result<Vec<TableRow>> {
        let connection = self.connect()?;
        let fragment = query.to_sql();
        let mut statement = connection.prepare(&fragment.sql)?;
        let names = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut rows = statement.query(params_from_iter(fragment.params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut mapped = TableRow::new();
            for (index, name) in names.iter().enumerate() {
                mapped.insert(name.clone(), cell_to_string(row, index)?.unwrap_or_default());
            }
            out.push(mapped);
        }
        Ok(out)
    }
}

impl PageDirectory for WikiDatabase {
    fn category_members(
        &self,
        category_key: &str,
        filter: Option<&TitleFilter<'_>>,
        limit: usize,
    ) -> Result<Vec<PageEntry>> {
        let connection = self.connect()?;
        let mut fragment = SqlFragment::default();
        fragment.params.push(category_key.to_string());
        fragment.params.push(NS_CATEGORY.to_string());
        fragment.sql.push_str(
            "SELECT p.page_namespace, p.page_title, pp.pp_value
             FROM categorylinks cl
             JOIN page p ON p.page_id = cl.cl_from
             LEFT JOIN page_props pp ON pp.pp_page = p.page_id AND pp.pp_propname = 'displaytitle'
             WHERE cl.cl_to = ?1 AND p.page_namespace <> CAST(?2 AS INTEGER)",
        );
        push_title_filter(&mut fragment, Some("p"), "page_title", filter)?;
        fragment
            .sql
            .push_str(&format!(" ORDER BY p.page_title ASC LIMIT {limit}"));
        query_page_entries(&connection, &fragment)
    }

    fn subcategories(&self, category_key: &str) -> Result<Vec<String>> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT p.page_title
             FROM categorylinks cl
             JOIN page p ON p.page_id = cl.cl_from
             WHERE cl.cl_to = ?1 AND p.page_namespace = ?2
             ORDER BY p.page_title ASC",
        )?;
        let rows = statement.query_map(params![category_key, NS_CATEGORY], |row| {
            row.get::<_, String>(0)
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn concept_members(
        &self,
        concept_key: &str,
        filter: Option<&TitleFilter<'_>>,
        limit: usize,
    ) -> Result<Vec<PageEntry>> {
        let schema = self.require_smw()?;
        let connection = self.connect()?;
        let ids = schema.ids_table();
        let mut fragment = SqlFragment::default();
        fragment.params.push(NS_CONCEPT.to_string());
        fragment.params.push(concept_key.to_string());
        fragment.sql.push_str(&format!(
            "SELECT member.smw_namespace, member.smw_title, pp.pp_value
             FROM smw_concept_cache cc
             JOIN {ids} concept ON cc.o_id = concept.smw_id
             JOIN {ids} member ON cc.s_id = member.smw_id
             LEFT JOIN page p ON p.page_namespace = member.smw_namespace AND p.page_title = member.smw_title
             LEFT JOIN page_props pp ON pp.pp_page = p.page_id AND pp.pp_propname = 'displaytitle'
             WHERE concept.smw_namespace = CAST(?1 AS INTEGER) AND concept.smw_title = ?2"
        ));
        push_title_filter(&mut fragment, Some("member"), "smw_title", filter)?;
        fragment
            .sql
            .push_str(&format!(" ORDER BY member.smw_title ASC LIMIT {limit}"));
        query_page_entries(&connection, &fragment)
    }

    fn namespace_pages(
        &self,
        namespace: i32,
        filter: Option<&TitleFilter<'_>>,
        limit: usize,
    ) -> Result<Vec<PageEntry>> {
        let connection = self.connect()?;
        let mut fragment = SqlFragment::default();
        fragment.params.push(namespace.to_string());
        fragment.sql.push_str(
            "SELECT p.page_namespace, p.page_title, pp.pp_value
             FROM page p
             LEFT JOIN page_props pp ON pp.pp_page = p.page_id AND pp.pp_propname = 'displaytitle'
             WHERE p.page_namespace = CAST(?1 AS INTEGER)",
        );
        push_title_filter(&mut fragment, Some("p"), "page_title", filter)?;
        fragment
            .sql
            .push_str(&format!(" ORDER BY p.page_title ASC LIMIT {limit}"));
        query_page_entries(&connection, &fragment)
    }
}

impl FormStore for WikiDatabase {
    fn default_form(&self, page: &PageTitle) -> AnyResult<Option<String>> {
        let connection = self.open_existing()?;
        let Some(page_id) = Self::page_id(&connection, page)? else {
            return Ok(None);
        };
        connection
            .query_row(
                "SELECT pp_value
                 FROM page_props
                 WHERE pp_page = ?1 AND pp_propname IN (?2, ?3)
                 ORDER BY CASE pp_propname WHEN ?2 THEN 0 ELSE 1 END
                 LIMIT 1",
                params![page_id, DEFAULT_FORM_PROPERTY, LEGACY_DEFAULT_FORM_PROPERTY],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("failed to read default form page property")
    }

    fn categories(&self, page: &PageTitle) -> AnyResult<Vec<String>> {
        let connection = self.open_existing()?;
        let Some(page_id) = Self::page_id(&connection, page)? else {
            return Ok(Vec::new());
        };
        let mut statement = connection
            .prepare("SELECT cl_to FROM categorylinks WHERE cl_from = ?1 ORDER BY cl_to ASC")
            .context("failed to prepare category query")?;
        let rows = statement
            .query_map([page_id], |row| row.get::<_, String>(0))
            .context("failed to run category query")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("failed to decode category row")?.replace('_', " "));
        }
        Ok(out)
    }

    fn schema_form(&self, category: &str) -> AnyResult<Option<String>> {
        let connection = self.open_existing()?;
        let category_page = PageTitle::new(NS_CATEGORY, category);
        let Some(page_id) = Self::page_id(&connection, &category_page)? else {
            return Ok(None);
        };
        let xml = connection
            .query_row(
                "SELECT pp_value FROM page_props WHERE pp_page = ?1 AND pp_propname = ?2",
                params![page_id, PAGE_SCHEMA_PROPERTY],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("failed to read page schema property")?;
        Ok(xml.as_deref().and_then(form_name_from_schema))
    }
}

impl PageCreationQueue for WikiDatabase {
    fn user_id(&self, user_name: &str) -> AnyResult<Option<i64>> {
        let connection = self.open_existing()?;
        connection
            .query_row(
                "SELECT user_id FROM user WHERE user_name = ?1",
                [user_name.replace('_', " ")],
                |row| row.get(0),
            )
            .optional()
            .context("failed to look up user")
    }

    fn push(&self, job: &PageCreationJob) -> AnyResult<()> {
        let connection = self.open_existing()?;
        let params_json = serde_json::json!({
            "form": job.form,
            "user_id": job.user_id,
            "page_text": job.page_text,
        });
        connection
            .execute(
                "INSERT INTO job (job_cmd, job_namespace, job_title, job_params, job_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    CREATE_PAGE_JOB,
                    job.title.namespace,
                    job.title.db_key(),
                    params_json.to_string(),
                    i64::try_from(unix_timestamp()?).context("timestamp does not fit into i64")?,
                ],
            )
            .with_context(|| format!("failed to enqueue page creation for {}", job.title.text))?;
        Ok(())
    }
}

/// The `name` attribute of the first `<Form>` element in a page schema.
fn form_name_from_schema(xml: &str) -> Option<String> {
    let start = xml.find("<Form")?;
    let element = &xml[start..];
    let element = &element[..element.find('>')?];
    let attribute = element.find("name=")?;
    let rest = &element[attribute + "name=".len()..];
    let quote = rest.chars().next().filter(|ch| *ch == '"' || *ch == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    let name = value[..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn push_title_filter(
    fragment: &mut SqlFragment,
    table: Option<&str>,
    column: &str,
    filter: Option<&TitleFilter<'_>>,
) -> Result<()> {
    let Some(filter) = filter else {
        return Ok(());
    };
    let column = FieldRef::Column(Column::new(table, column)?);
    let condition: Condition =
        substring_condition(&column, &filter.substring.replace(' ', "_"), filter.mode, '_');
    fragment.sql.push_str(" AND ");
    condition.render(fragment);
    Ok(())
}

fn query_page_entries(connection: &Connection, fragment: &SqlFragment) -> Result<Vec<PageEntry>> {
    let mut statement = connection.prepare(&fragment.sql)?;
    let rows = statement.query_map(params_from_iter(fragment.params.iter()), |row| {
        let namespace: i32 = row.get(0)?;
        let title: String = row.get(1)?;
        let display_title: Option<String> = row.get(2)?;
        Ok(PageEntry {
            title: PageTitle::new(namespace, &title),
            display_title: display_title.filter(|value| !value.trim().is_empty()),
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn cell_to_string(row: &Row<'_>, index: usize) -> Result<Option<String>> {
    let value = match row.get_ref(index)? {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    };
    Ok(value)
}

fn open_connection(db_path: &Path) -> AnyResult<Connection> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    connection
        .busy_timeout(Duration::from_secs(5))
        .context("failed to set sqlite busy timeout")?;
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to enable WAL journal mode")?;
    register_lower_function(&connection)?;
    Ok(connection)
}

/// SQLite's own `lower()` and `LIKE` fold ASCII only.
fn register_lower_function(connection: &Connection) -> AnyResult<()> {
    connection
        .create_scalar_function(
            LOWER_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |context| {
                let folded = match context.get_raw(0) {
                    ValueRef::Null => None,
                    ValueRef::Integer(value) => Some(value.to_string()),
                    ValueRef::Real(value) => Some(value.to_string()),
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                        Some(String::from_utf8_lossy(bytes).to_lowercase())
                    }
                };
                Ok(folded)
            },
        )
        .with_context(|| format!("failed to register {LOWER_FUNCTION}"))
}

fn unix_timestamp() -> AnyResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before UNIX_EPOCH")
        .map(|duration| duration.as_secs())
}

/// Seeding helpers for tests across the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use rusqlite::{OptionalExtension, params};
    use tempfile::TempDir;

    use super::{WikiDatabase, open_connection};
    use crate::predicate::quote_identifier;
    use crate::schema::SmwSchema;

    pub(crate) fn database(schema: Option<SmwSchema>) -> (TempDir, WikiDatabase) {
        let temp = tempfile::tempdir().expect("tempdir");
        let database = WikiDatabase::new(temp.path().join("data").join("wiki.db"), schema);
        database.initialize().expect("initialize");
        (temp, database)
    }

    impl WikiDatabase {
        pub(crate) fn add_page(&self, namespace: i32, title: &str) -> i64 {
            let connection = open_connection(&self.db_path).expect("open");
            connection
                .execute(
                    "INSERT OR IGNORE INTO page (page_namespace, page_title) VALUES (?1, ?2)",
                    params![namespace, title.replace(' ', "_")],
                )
                .expect("insert page");
            connection
                .query_row(
                    "SELECT page_id FROM page WHERE page_namespace = ?1 AND page_title = ?2",
                    params![namespace, title.replace(' ', "_")],
                    |row| row.get(0),
                )
                .expect("page id")
        }

        pub(crate) fn add_category(&self, page_id: i64, category: &str) {
            let connection = open_connection(&self.db_path).expect("open");
            connection
                .execute(
                    "INSERT OR IGNORE INTO categorylinks (cl_from, cl_to) VALUES (?1, ?2)",
                    params![page_id, category.replace(' ', "_")],
                )
                .expect("insert categorylink");
        }

        pub(crate) fn set_page_prop(&self, page_id: i64, name: &str, value: &str) {
            let connection = open_connection(&self.db_path).expect("open");
            connection
                .execute(
                    "INSERT OR REPLACE INTO page_props (pp_page, pp_propname, pp_value) VALUES (?1, ?2, ?3)",
                    params![page_id, name, value],
                )
                .expect("insert page prop");
        }

        pub(crate) fn add_user(&self, name: &str) -> i64 {
            let connection = open_connection(&self.db_path).expect("open");
            connection
                .execute("INSERT INTO user (user_name) VALUES (?1)", [name])
                .expect("insert user");
            connection.last_insert_rowid()
        }

        pub(crate) fn job_rows(&self) -> Vec<(String, i32, String, String)> {
            let connection = open_connection(&self.db_path).expect("open");
            let mut statement = connection
                .prepare("SELECT job_cmd, job_namespace, job_title, job_params FROM job ORDER BY job_id")
                .expect("prepare");
            statement
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .expect("query")
                .map(|row| row.expect("row"))
                .collect()
        }

        fn smw_id(&self, namespace: i32, title: &str) -> i64 {
            let ids = self.smw_schema.expect("smw schema").ids_table();
            let connection = open_connection(&self.db_path).expect("open");
            let key = title.replace(' ', "_");
            let existing: Option<i64> = connection
                .query_row(
                    &format!("SELECT smw_id FROM {ids} WHERE smw_namespace = ?1 AND smw_title = ?2"),
                    params![namespace, key],
                    |row| row.get(0),
                )
                .optional()
                .expect("select smw id");
            if let Some(id) = existing {
                return id;
            }
            connection
                .execute(
                    &format!("INSERT INTO {ids} (smw_namespace, smw_title) VALUES (?1, ?2)"),
                    params![namespace, key],
                )
                .expect("insert smw id");
            connection.last_insert_rowid()
        }

        pub(crate) fn declare_property(&self, name: &str, type_id: &str) {
            let connection = open_connection(&self.db_path).expect("open");
            connection
                .execute(
                    "INSERT OR REPLACE INTO smw_fpt_type (smw_title, type_id) VALUES (?1, ?2)",
                    params![name.replace(' ', "_"), type_id],
                )
                .expect("declare property");
        }

        pub(crate) fn add_page_value(&self, subject: &str, property: &str, object: &str) {
            let schema = self.smw_schema.expect("smw schema");
            let s_id = self.smw_id(0, subject);
            let p_id = self.smw_id(102, property);
            let o_id = self.smw_id(0, object);
            let connection = open_connection(&self.db_path).expect("open");
            connection
                .execute(
                    &format!(
                        "INSERT INTO {} (s_id, p_id, o_id) VALUES (?1, ?2, ?3)",
                        schema.page_values_table()
                    ),
                    params![s_id, p_id, o_id],
                )
                .expect("insert page value");
        }

        pub(crate) fn add_literal_value(&self, subject: &str, property: &str, value: &str) {
            let schema = self.smw_schema.expect("smw schema");
            let s_id = self.smw_id(0, subject);
            let p_id = self.smw_id(102, property);
            let connection = open_connection(&self.db_path).expect("open");
            connection
                .execute(
                    &format!(
                        "INSERT INTO {} (s_id, p_id, {}) VALUES (?1, ?2, ?3)",
                        schema.literal_values_table(),
                        schema.literal_value_column()
                    ),
                    params![s_id, p_id, value],
                )
                .expect("insert literal value");
        }

        pub(crate) fn add_concept_member(&self, concept: &str, namespace: i32, title: &str) {
            let o_id = self.smw_id(crate::title::NS_CONCEPT, concept);
            let s_id = self.smw_id(namespace, title);
            let connection = open_connection(&self.db_path).expect("open");
            connection
                .execute(
                    "INSERT INTO smw_concept_cache (s_id, o_id) VALUES (?1, ?2)",
                    params![s_id, o_id],
                )
                .expect("insert concept member");
        }

        pub(crate) fn declare_cargo_table(&self, table: &str, fields: &[(&str, bool)]) {
            let connection = open_connection(&self.db_path).expect("open");
            let mut columns = vec![
                "\"_ID\" INTEGER PRIMARY KEY".to_string(),
                "\"_pageName\" TEXT NOT NULL".to_string(),
            ];
            for (field, is_list) in fields {
                columns.push(format!("{} TEXT", quote_identifier(field)));
                connection
                    .execute(
                        "INSERT INTO cargo_tables (main_table, field_name, is_list) VALUES (?1, ?2, ?3)",
                        params![table, field, i64::from(*is_list)],
                    )
                    .expect("declare cargo field");
                if *is_list {
                    connection
                        .execute_batch(&format!(
                            "CREATE TABLE {} (\"_rowID\" INTEGER NOT NULL, \"_value\" TEXT NOT NULL)",
                            quote_identifier(&format!("cargo__{table}___{field}"))
                        ))
                        .expect("create list table");
                }
            }
            connection
                .execute_batch(&format!(
                    "CREATE TABLE {} ({})",
                    quote_identifier(&format!("cargo__{table}")),
                    columns.join(", ")
                ))
                .expect("create cargo table");
        }

        pub(crate) fn insert_cargo_row(&self, table: &str, page_name: &str, values: &[(&str, &str)]) {
            let connection = open_connection(&self.db_path).expect("open");
            let mut names = vec!["\"_pageName\"".to_string()];
            let mut placeholders = vec!["?1".to_string()];
            let mut bound = vec![page_name.to_string()];
            for (field, value) in values {
                names.push(quote_identifier(field));
                bound.push((*value).to_string());
                placeholders.push(format!("?{}", bound.len()));
            }
            connection
                .execute(
                    &format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        quote_identifier(&format!("cargo__{table}")),
                        names.join(", "),
                        placeholders.join(", ")
                    ),
                    rusqlite::params_from_iter(bound.iter()),
                )
                .expect("insert cargo row");
            let row_id = connection.last_insert_rowid();
            for (field, value) in values {
                let is_list: Option<i64> = connection
                    .query_row(
                        "SELECT is_list FROM cargo_tables WHERE main_table = ?1 AND field_name = ?2",
                        params![table, field],
                        |row| row.get(0),
                    )
                    .optional()
                    .expect("field schema");
                if is_list != Some(1) {
                    continue;
                }
                for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
                    connection
                        .execute(
                            &format!(
                                "INSERT INTO {} (\"_rowID\", \"_value\") VALUES (?1, ?2)",
                                quote_identifier(&format!("cargo__{table}___{field}"))
                            ),
                            params![row_id, item],
                        )
                        .expect("insert list value");
                }
            }
        }
    }
}
