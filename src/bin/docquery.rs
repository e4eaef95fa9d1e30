use clap::{Parser, Subcommand};
use docquery::config::{ClientConfig, ConfigLayer};
use docquery::{Connection, cli as prog_cli, logger};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docquery", version, about = "Query a MongoDB-compatible collection", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, defaults are used.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Endpoint URI: mongodb://, mongodb+srv:// or memory://")]
    uri: Option<String>,
    #[arg(long, help = "Database name")]
    db: Option<String>,
    #[arg(long, help = "Collection name")]
    collection: Option<String>,
    #[arg(long, help = "JSON or NDJSON file loaded into a memory:// endpoint")]
    seed: Option<PathBuf>,
    #[arg(long, help = "error|warn|info|debug|trace|off")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "findOne, find and a capped cursor walk over the collection")]
    Demo {
        #[arg(long)]
        max_items: Option<usize>,
    },
    #[command(name = "find-one", about = "Print the first matching document or null")]
    FindOne {
        #[arg(long, default_value = "{}")]
        filter: String,
        #[arg(long, help = "JSON document or short form like -rating,title")]
        sort: Option<String>,
        #[arg(long, help = "JSON document or short form like title,imdb,-_id")]
        project: Option<String>,
    },
    #[command(about = "Print every matching document as NDJSON")]
    Find {
        #[arg(long, default_value = "{}")]
        filter: String,
        #[arg(long)]
        batch_size: Option<u32>,
        #[arg(long, allow_negative_numbers = true, help = "Negative values return a single batch")]
        limit: Option<i64>,
        #[arg(long)]
        skip: Option<u64>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        project: Option<String>,
    },
    #[command(about = "Stream matching documents through a cursor")]
    Iterate {
        #[arg(long, default_value = "{}")]
        filter: String,
        #[arg(long)]
        batch_size: Option<u32>,
        #[arg(long)]
        max_items: Option<usize>,
    },
}

fn init_logging(cfg: &ClientConfig) {
    let res = match &cfg.log_config {
        Some(path) => logger::init_file(path),
        None => logger::init(cfg.log_level.as_deref(), cfg.log_file.as_deref()),
    };
    if let Err(e) = res {
        eprintln!("warning: logging disabled: {e}");
    }
}

fn to_command(cmd: Commands, cfg: &ClientConfig) -> prog_cli::Command {
    match cmd {
        Commands::Demo { max_items } => prog_cli::Command::Demo {
            max_items: max_items.unwrap_or(cfg.max_items),
            batch_size: cfg.batch_size,
        },
        Commands::FindOne { filter, sort, project } => {
            prog_cli::Command::FindOne { filter_json: filter, sort, project }
        }
        Commands::Find { filter, batch_size, limit, skip, sort, project } => prog_cli::Command::Find {
            filter_json: filter,
            batch_size: batch_size.or(Some(cfg.batch_size)),
            limit,
            skip,
            sort,
            project,
        },
        Commands::Iterate { filter, batch_size, max_items } => prog_cli::Command::Iterate {
            filter_json: filter,
            batch_size: batch_size.or(Some(cfg.batch_size)),
            max_items,
        },
    }
}

async fn execute(cmd: Commands, cfg: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ns = cfg.namespace()?;
    let command = to_command(cmd, cfg);
    let conn = Connection::connect(cfg).await?;
    conn.scoped(async move |c: &Connection| {
        let mut out = std::io::stdout().lock();
        prog_cli::run(c, &ns, command, &mut out).await
    })
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let layer = ConfigLayer {
        uri: cli.uri.clone(),
        database: cli.db.clone(),
        collection: cli.collection.clone(),
        seed: cli.seed.clone(),
        log_level: cli.log_level.clone(),
        ..ConfigLayer::default()
    };
    let cfg = match ClientConfig::load(layer, cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&cfg);
    log::debug!("using {}", cfg.namespace().map(|n| n.to_string()).unwrap_or_default());

    if let Err(e) = execute(cli.command, &cfg).await {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
