use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::AppConfig;
use snipgraph_graph::{render_json, render_markdown, ContextAssembler, Direction};
use snipgraph_indexer::{
    project_manifest_dependencies, project_structure, FileScanner, ProjectIndexer,
};
use snipgraph_store::{GraphStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;

#[derive(Parser)]
#[command(name = "snipgraph")]
#[command(about = "Snippet dependency graph and context bundles for source trees", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (default: <root>/snipgraph.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Graph database path, overriding the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every tracked file from scratch and print stats as JSON
    Index(RootArgs),

    /// Index, then keep the graph in sync with file changes
    Watch(RootArgs),

    /// Assemble the snippets related to one or more ids
    Context(ContextArgs),

    /// List stored snippet ids under a source path prefix
    Snippets(SnippetsArgs),

    /// Direct dependencies of a snippet
    Deps(IdArgs),

    /// Snippets that directly depend on a snippet
    Dependents(IdArgs),

    /// Manifest dependencies and tracked files with their snippets
    Structure(RootArgs),
}

#[derive(Args)]
struct RootArgs {
    /// Project root (overrides --root)
    path: Option<PathBuf>,
}

#[derive(Args)]
struct ContextArgs {
    /// Seed snippet ids
    #[arg(required = true)]
    ids: Vec<String>,

    /// Walk towards snippets that reference the seeds
    #[arg(long)]
    dependents: bool,

    /// Context budget (default from config)
    #[arg(long)]
    budget: Option<usize>,

    /// Put the seed snippets themselves into the bundle
    #[arg(long)]
    with_seeds: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,
}

#[derive(Args)]
struct SnippetsArgs {
    /// Source path prefix, relative to the root (default: everything)
    prefix: Option<PathBuf>,
}

#[derive(Args)]
struct IdArgs {
    id: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

/// Resolved root, configuration and open store for one invocation
struct Session {
    root: PathBuf,
    config: AppConfig,
    store: Arc<dyn GraphStore>,
}

impl Session {
    fn open(cli: &Cli, root_override: Option<&Path>) -> Result<Self> {
        let root = root_override
            .or(cli.root.as_deref())
            .unwrap_or_else(|| Path::new("."));
        let root = root
            .canonicalize()
            .with_context(|| format!("Project root {} not found", root.display()))?;

        let config = AppConfig::load(&root, cli.config.as_deref())?;
        let db_path = match &cli.db {
            Some(path) => path.clone(),
            None => config.database_path(&root),
        };
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open graph database {}", db_path.display()))?;
        log::debug!("Using graph database {}", db_path.display());

        Ok(Self {
            root,
            config,
            store: Arc::new(store),
        })
    }

    fn indexer(&self) -> Result<ProjectIndexer> {
        Ok(ProjectIndexer::new(
            &self.root,
            &self.config.indexer_config(),
            Arc::clone(&self.store),
        )?)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match &cli.command {
        Commands::Index(args) => run_index(&cli, args),
        Commands::Watch(args) => run_watch(&cli, args),
        Commands::Context(args) => run_context(&cli, args),
        Commands::Snippets(args) => run_snippets(&cli, args),
        Commands::Deps(args) => run_edges(&cli, args, Direction::Dependencies),
        Commands::Dependents(args) => run_edges(&cli, args, Direction::Dependents),
        Commands::Structure(args) => run_structure(&cli, args),
    }
}

fn run_index(cli: &Cli, args: &RootArgs) -> Result<()> {
    let session = Session::open(cli, args.path.as_deref())?;
    let stats = session.indexer()?.index_all()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_watch(cli: &Cli, args: &RootArgs) -> Result<()> {
    let session = Session::open(cli, args.path.as_deref())?;
    let indexer = session.indexer()?;

    let stats = indexer.index_all()?;
    log::info!(
        "Initial index: {} files, {} snippets; watching for changes (Ctrl-C to stop)",
        stats.files,
        stats.snippets
    );
    indexer.watch()?;
    Ok(())
}

fn run_context(cli: &Cli, args: &ContextArgs) -> Result<()> {
    let session = Session::open(cli, None)?;
    let assembler =
        ContextAssembler::new(Arc::clone(&session.store)).with_sizing(session.config.sizing);

    let mut seeds = Vec::with_capacity(args.ids.len());
    for id in &args.ids {
        match session.store.get_snippet(id)? {
            Some(snippet) => seeds.push(snippet),
            None => log::warn!("Unknown snippet id {id}"),
        }
    }

    let direction = if args.dependents {
        Direction::Dependents
    } else {
        Direction::Dependencies
    };
    let budget = args.budget.unwrap_or(session.config.budget);

    let mut bundle = assembler.assemble(&args.ids, direction, budget)?;
    if args.with_seeds {
        seeds.append(&mut bundle);
        bundle = seeds;
    }
    let bundle = assembler.order(bundle)?;
    log::info!("Assembled {} snippets (budget {budget})", bundle.len());

    match args.format {
        OutputFormat::Markdown => print!("{}", render_markdown(&bundle)),
        OutputFormat::Json => println!("{}", render_json(&bundle)?),
    }
    Ok(())
}

fn run_snippets(cli: &Cli, args: &SnippetsArgs) -> Result<()> {
    let session = Session::open(cli, None)?;
    let prefix = match &args.prefix {
        Some(prefix) if prefix.is_absolute() => prefix.clone(),
        Some(prefix) => session.root.join(prefix),
        None => session.root.clone(),
    };

    for id in session.store.list_snippet_ids(&prefix.to_string_lossy())? {
        println!("{id}");
    }
    Ok(())
}

fn run_edges(cli: &Cli, args: &IdArgs, direction: Direction) -> Result<()> {
    let session = Session::open(cli, None)?;
    if session.store.get_snippet(&args.id)?.is_none() {
        bail!("Unknown snippet id {}", args.id);
    }

    let ids = match direction {
        Direction::Dependencies => session.store.get_direct_dependencies(&args.id)?,
        Direction::Dependents => session.store.get_direct_dependents(&args.id)?,
    };
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn run_structure(cli: &Cli, args: &RootArgs) -> Result<()> {
    let session = Session::open(cli, args.path.as_deref())?;
    let files = FileScanner::new(&session.root).scan(|_| true);

    let dependencies = project_manifest_dependencies(&files);
    if !dependencies.is_empty() {
        println!("{}", dependencies.to_markdown());
    }
    print!(
        "{}",
        project_structure(&session.root, &files, session.store.as_ref())?
    );
    Ok(())
}
