use aleutian_core::config::Settings;
use aleutian_core::instrumentation::noop_sink;
use aleutian_core::service::{ParserRegistry, ServiceCache};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codeintel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Code-intelligence smoke harness: Init a project and run a couple of graph queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk, parse, and build a graph for a project root
    Init {
        path: PathBuf,
        #[arg(long, value_delimiter = ',')]
        languages: Vec<String>,
    },
    /// Init a project root, then find callers of a symbol id in it
    Callers {
        path: PathBuf,
        symbol_id: String,
        #[arg(long, value_delimiter = ',')]
        languages: Vec<String>,
    },
    /// Show the current merged configuration
    Config,
}

#[tokio::main]
async fn main() {
    aleutian_core::logging::init();

    let cli = Cli::parse();
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}, falling back to defaults");
        Settings::default()
    });

    match cli.command {
        Commands::Config => {
            println!("{:#?}", settings);
        }
        Commands::Init { path, languages } => {
            let service = ServiceCache::new(
                settings.cache,
                settings.graph,
                ParserRegistry::new(),
                noop_sink(),
                settings.lsp,
            );
            match service.init(&path, &languages, &[]).await {
                Ok(response) => println!("{:#?}", response),
                Err(e) => {
                    eprintln!("init failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Callers { path, symbol_id, languages } => {
            let service = ServiceCache::new(
                settings.cache,
                settings.graph,
                ParserRegistry::new(),
                noop_sink(),
                settings.lsp,
            );
            let response = match service.init(&path, &languages, &[]).await {
                Ok(response) => response,
                Err(e) => {
                    eprintln!("init failed: {e}");
                    std::process::exit(1);
                }
            };
            match service.find_callers(&response.graph_id, &symbol_id, None) {
                Ok(result) => println!("{:#?}", result),
                Err(e) => {
                    eprintln!("find_callers failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
