mod commands;
mod config;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use treeport_core::LogFormat;

#[derive(Parser)]
#[command(name = "treeport")]
#[command(about = "Browse and transfer files in an object-store bucket as a directory tree", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/treeport/config.toml")]
    config: PathBuf,

    /// User whose directory mappings are opened
    #[arg(short, long, default_value_t = 1)]
    user: u64,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Log format (json or text)
    #[arg(long)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    InitConfig,

    /// Print every mapping's tree
    Tree,

    /// List folders and files inside a folder
    Ls {
        /// Directory mapping ID
        mapping: u64,

        /// Folder key (defaults to the mapping root)
        folder: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Download a file
    Get {
        /// Directory mapping ID
        mapping: u64,

        /// Full key of the file
        key: String,

        /// Local destination path
        local: PathBuf,
    },

    /// Upload a local file into a folder
    Put {
        /// Directory mapping ID
        mapping: u64,

        /// Folder key to upload into
        folder: String,

        /// Local file to upload
        local: PathBuf,

        /// Replace an existing file with the same name
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a file
    Rm {
        /// Directory mapping ID
        mapping: u64,

        /// Full key of the file
        key: String,
    },

    /// Rename a file within its folder
    Mv {
        /// Directory mapping ID
        mapping: u64,

        /// Full key of the file
        key: String,

        /// New file name
        new_name: String,
    },

    /// Download several files as one zip archive
    Zip {
        /// Directory mapping ID
        mapping: u64,

        /// Local archive path
        out: PathBuf,

        /// Full keys of the files to include
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig = cli.command {
        return commands::init_config(&cli.config).await;
    }

    let mut config = config::load_config(&cli.config).await?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    let _log_guard = logging::init(&config.logging);

    let session = commands::open_session(&config, cli.user).await?;

    match cli.command {
        Commands::InitConfig => {}
        Commands::Tree => commands::browse::tree(&session).await,
        Commands::Ls { mapping, folder, json } => {
            commands::browse::ls(&session, mapping, folder, json).await?
        }
        Commands::Get { mapping, key, local } => {
            commands::transfer::get(&session, mapping, &key, &local).await?
        }
        Commands::Put {
            mapping,
            folder,
            local,
            overwrite,
        } => commands::transfer::put(&session, mapping, &folder, &local, overwrite).await?,
        Commands::Zip { mapping, out, keys } => {
            commands::transfer::zip(&session, mapping, &keys, &out).await?
        }
        Commands::Rm { mapping, key } => commands::manage::rm(&session, mapping, &key).await?,
        Commands::Mv {
            mapping,
            key,
            new_name,
        } => commands::manage::mv(&session, mapping, &key, &new_name).await?,
    }

    Ok(())
}
