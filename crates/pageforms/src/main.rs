use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pageforms_core::autocomplete::{AutocompleteResponse, Autocompleter, Backends};
use pageforms_core::config::{PageFormsConfig, load_config};
use pageforms_core::external_values::HttpFetcher;
use pageforms_core::forms::FormResolver;
use pageforms_core::red_links::{create_page_with_form, red_link_href};
use pageforms_core::request::AutocompleteRequest;
use pageforms_core::store::WikiDatabase;
use pageforms_core::title::{NamespaceTable, PageTitle};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_PATH: &str = ".pageforms/wiki.db";
const DEFAULT_CONFIG_PATH: &str = ".pageforms/config.toml";

#[derive(Debug, Parser)]
#[command(
    name = "pageforms",
    version,
    about = "Autocomplete values and form resolution over a wiki database"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", env = "PAGEFORMS_DB")]
    db: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", env = "PAGEFORMS_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Query autocomplete values and print the API response")]
    Autocomplete(AutocompleteArgs),
    #[command(about = "Print the forms that edit a page")]
    Forms { title: String },
    #[command(name = "red-link", about = "Print the form-edit href for a missing page")]
    RedLink {
        title: String,
        #[arg(long, help = "Treat the target as an existing page")]
        known: bool,
    },
    #[command(name = "create-page", about = "Queue creation of a page with a form")]
    CreatePage(CreatePageArgs),
    Db(DbArgs),
}

#[derive(Debug, Args)]
struct AutocompleteArgs {
    #[arg(long, default_value = "")]
    substr: String,
    #[arg(long)]
    property: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    concept: Option<String>,
    #[arg(long)]
    cargo_table: Option<String>,
    #[arg(long)]
    cargo_field: Option<String>,
    #[arg(long)]
    namespace: Option<String>,
    #[arg(long, value_name = "ALIAS")]
    external_url: Option<String>,
    #[arg(long)]
    baseprop: Option<String>,
    #[arg(long)]
    base_cargo_table: Option<String>,
    #[arg(long)]
    base_cargo_field: Option<String>,
    #[arg(long)]
    basevalue: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
}

impl From<AutocompleteArgs> for AutocompleteRequest {
    fn from(args: AutocompleteArgs) -> Self {
        Self {
            substr: args.substr,
            property: args.property,
            category: args.category,
            concept: args.concept,
            cargo_table: args.cargo_table,
            cargo_field: args.cargo_field,
            namespace: args.namespace,
            external_url: args.external_url,
            baseprop: args.baseprop,
            base_cargo_table: args.base_cargo_table,
            base_cargo_field: args.base_cargo_field,
            basevalue: args.basevalue,
            limit: args.limit,
        }
    }
}

#[derive(Debug, Args)]
struct CreatePageArgs {
    title: String,
    #[arg(long, value_name = "NAME")]
    form: String,
    #[arg(long, value_name = "PATH", help = "Read the page text from a file")]
    text_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct DbArgs {
    #[command(subcommand)]
    command: DbSubcommand,
}

#[derive(Debug, Subcommand)]
enum DbSubcommand {
    #[command(about = "Create the wiki schema")]
    Init,
}

struct Runtime {
    config: PageFormsConfig,
    namespaces: NamespaceTable,
    database: WikiDatabase,
}

impl Runtime {
    fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let config = load_config(&config_path)?;
        let namespaces = NamespaceTable::new(&config.wiki.custom_namespaces);
        let db_path = cli
            .db
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let database = WikiDatabase::new(db_path, config.autocomplete_settings().smw_schema);
        Ok(Self {
            config,
            namespaces,
            database,
        })
    }

    fn parse_title(&self, value: &str) -> Result<PageTitle> {
        match PageTitle::parse(value, &self.namespaces) {
            Some(title) => Ok(title),
            None => bail!("invalid page title: {value:?}"),
        }
    }

    fn resolver(&self) -> FormResolver<'_> {
        FormResolver::new(&self.database, &self.config, &self.namespaces)
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let runtime = Runtime::load(&cli)?;

    match cli.command {
        Commands::Autocomplete(args) => run_autocomplete(runtime, args),
        Commands::Forms { title } => run_forms(&runtime, &title),
        Commands::RedLink { title, known } => run_red_link(&runtime, &title, known),
        Commands::CreatePage(args) => run_create_page(&runtime, args),
        Commands::Db(DbArgs {
            command: DbSubcommand::Init,
        }) => run_db_init(&runtime),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PAGEFORMS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_autocomplete(runtime: Runtime, args: AutocompleteArgs) -> Result<()> {
    let settings = runtime.config.autocomplete_settings();
    let database = Arc::new(runtime.database);
    let backends = Backends {
        properties: Some(database.clone()),
        tables: Some(database.clone()),
        pages: database,
        external: Arc::new(HttpFetcher::from_env()?),
    };
    let autocompleter = Autocompleter::new(settings, runtime.namespaces, backends);
    let response = autocompleter.respond(args.into());
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let AutocompleteResponse::Failure { error } = response {
        bail!("autocomplete failed with code {}", error.code);
    }
    Ok(())
}

fn run_forms(runtime: &Runtime, title: &str) -> Result<()> {
    let page = runtime.parse_title(title)?;
    let forms = runtime.resolver().resolve_forms(&page);
    println!("{}", serde_json::to_string_pretty(&forms)?);
    Ok(())
}

fn run_red_link(runtime: &Runtime, title: &str, known: bool) -> Result<()> {
    let page = runtime.parse_title(title)?;
    let resolver = runtime.resolver();
    if let Some(href) = red_link_href(&page, known, &runtime.config, &runtime.namespaces, &resolver) {
        println!("{href}");
    }
    Ok(())
}

fn run_create_page(runtime: &Runtime, args: CreatePageArgs) -> Result<()> {
    let page = runtime.parse_title(&args.title)?;
    let page_text = match &args.text_file {
        Some(path) => read_text(path)?,
        None => String::new(),
    };
    let job = create_page_with_form(&runtime.database, &runtime.config, &page, &args.form, &page_text)?;
    println!(
        "queued {} with form {} (user {})",
        page.prefixed_text(&runtime.namespaces),
        job.form,
        job.user_id
    );
    Ok(())
}

fn run_db_init(runtime: &Runtime) -> Result<()> {
    runtime.database.initialize()?;
    println!("initialized {}", normalize_path(runtime.database.db_path()));
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
