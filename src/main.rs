use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpulse::Venue;
use stockpulse::cli::commands;

#[derive(Parser)]
#[command(name = "stockpulse")]
#[command(
    version,
    about = "Stock assistant core: AI failover, rate governing and market-hours price sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the assistant a question
    Ask {
        #[arg(help = "Question to send")]
        prompt: String,
        #[arg(long, help = "Conversation id (random if omitted)")]
        conversation: Option<String>,
        #[arg(long, help = "Stock code to ground the question on")]
        stock: Option<String>,
    },

    /// Run one price sync cycle
    Sync {
        #[arg(long, help = "Sync even when the market is closed")]
        force: bool,
    },

    /// Run the price sync scheduler and rate governor sweep until Ctrl-C
    Run,

    /// Show trading session state
    Market {
        #[arg(long, help = "Evaluate at this RFC 3339 timestamp instead of now")]
        at: Option<String>,
        #[arg(long, help = "Also fetch TAIEX and OTC index levels")]
        indices: bool,
    },

    /// Show providers, market and local data status
    Status {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Manage the symbol universe
    Symbols {
        #[command(subcommand)]
        action: SymbolsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SymbolsAction {
    /// Add or update a symbol
    Add {
        code: String,
        name: String,
        #[arg(long, help = "Industry category")]
        category: Option<String>,
        #[arg(long, help = "Venue: tse, otc (inferred from the code if omitted)")]
        venue: Option<Venue>,
        #[arg(long, help = "Store without polling it")]
        inactive: bool,
    },
    /// List symbols with their last stored price
    List {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mStockPulse encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Ask {
            prompt,
            conversation,
            stock,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::ask::run(commands::ask::AskOptions {
                prompt,
                conversation,
                stock,
            }))?;
        }
        Commands::Sync { force } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::sync::run(force))?;
        }
        Commands::Run => {
            let rt = Runtime::new()?;
            rt.block_on(commands::run::run())?;
        }
        Commands::Market { at, indices } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::market::run(at, indices))?;
        }
        Commands::Status { format } => {
            commands::status::run(&format)?;
        }
        Commands::Symbols { action } => match action {
            SymbolsAction::Add {
                code,
                name,
                category,
                venue,
                inactive,
            } => {
                commands::symbols::add(commands::symbols::AddOptions {
                    code,
                    name,
                    category,
                    venue,
                    inactive,
                })?;
            }
            SymbolsAction::List { format } => {
                commands::symbols::list(&format)?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                commands::config::show(global, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
