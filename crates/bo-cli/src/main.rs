use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::docs::DocKind;

#[derive(Parser)]
#[command(name = "bo")]
#[command(about = "Back-office module and reference-data CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Module reconciliation
    Modules {
        #[command(subcommand)]
        cmd: ModulesCmd,
    },

    /// Activity classification (NAF) reference data
    Naf {
        #[command(subcommand)]
        cmd: NafCmd,
    },

    /// HR document generation
    Docs {
        #[command(subcommand)]
        cmd: DocsCmd,
    },
}

#[derive(Subcommand)]
enum ModulesCmd {
    /// Reconcile a prior module map against a plan's feature set and print the report.
    Reconcile {
        /// Feature set JSON (or @path). Omit to simulate "no plan".
        #[arg(long)]
        features: Option<String>,

        /// Prior module map JSON (or @path). Defaults to {}.
        #[arg(long)]
        prior: Option<String>,

        /// Plan name (enterprise names force every client-facing module on)
        #[arg(long)]
        plan: Option<String>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Rewrite legacy module keys to canonical codes and print the result.
    Migrate {
        /// Stored module map JSON (or @path)
        #[arg(long)]
        modules: String,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Run one reconciliation pass for a client against the live backend.
    Sync {
        #[arg(long)]
        client_id: String,

        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum NafCmd {
    /// Generate the SQL seed file from a CSV export.
    Seed {
        #[arg(long)]
        input: String,

        #[arg(long)]
        output: String,

        /// Target table (default: /naf/table, then naf_codes)
        #[arg(long)]
        table: Option<String>,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DocsCmd {
    /// Collaborator sheet PDF from a collaborator JSON record.
    Collaborator {
        #[arg(long)]
        input: String,

        #[arg(long)]
        output: String,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Employment contract PDF from a contract JSON record.
    Contract {
        #[arg(long)]
        input: String,

        #[arg(long)]
        output: String,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = bo_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Modules { cmd } => match cmd {
            ModulesCmd::Reconcile {
                features,
                prior,
                plan,
                config_paths,
            } => commands::modules::modules_reconcile(features, prior, plan, config_paths)?,
            ModulesCmd::Migrate {
                modules,
                config_paths,
            } => commands::modules::modules_migrate(modules, config_paths)?,
            ModulesCmd::Sync {
                client_id,
                config_paths,
            } => commands::modules::modules_sync(client_id, config_paths).await?,
        },

        Commands::Naf { cmd } => match cmd {
            NafCmd::Seed {
                input,
                output,
                table,
                config_paths,
            } => commands::naf::naf_seed(input, output, table, config_paths)?,
        },

        Commands::Docs { cmd } => match cmd {
            DocsCmd::Collaborator {
                input,
                output,
                config_paths,
            } => commands::docs::docs_render(DocKind::Collaborator, input, output, config_paths)?,
            DocsCmd::Contract {
                input,
                output,
                config_paths,
            } => commands::docs::docs_render(DocKind::Contract, input, output, config_paths)?,
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
