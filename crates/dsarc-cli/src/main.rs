//! `dsarc` command-line tool
//!
//! Drives the archive service from a terminal: detect and list archives,
//! extract them to editable folders, rebuild folders into archives and save
//! edited archives through the sparse overlay. Ctrl-C cancels the running
//! operation; a cancelled command exits without writing partial output.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dsarc_archive::{ArchiveService, ServiceConfig};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::commands::{ChunkArg, Interrupt};

#[derive(Parser)]
#[command(name = "dsarc")]
#[command(about = "Extract, edit and rebuild DSARC and MSND sound archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level
    #[arg(short, long, value_enum, default_value = "info", env = "DSARC_LOG_LEVEL")]
    log_level: LogLevel,

    /// Service configuration file (JSON)
    #[arg(short, long, global = true, env = "DSARC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the container format of a file
    Detect {
        /// File to classify
        path: PathBuf,
    },

    /// Check that a file decodes and re-encodes byte for byte
    Verify {
        /// Archive file
        path: PathBuf,
    },

    /// List the entries of an archive
    List {
        /// Archive file
        archive: PathBuf,

        /// Also list the chunks of embedded MSND entries
        #[arg(long)]
        children: bool,
    },

    /// Extract every entry into `<dest>/<archive stem>/`
    Extract {
        /// Archive file
        archive: PathBuf,

        /// Destination folder
        #[arg(default_value = ".")]
        dest: PathBuf,

        /// Unpack embedded containers into subfolders
        #[arg(long)]
        nested: bool,
    },

    /// Extract a single entry or chunk (`3` or `3:1`)
    ExtractEntry {
        /// Archive file
        archive: PathBuf,

        /// Entry id: `<entry>` or `<entry>:<chunk>`
        #[arg(value_parser = commands::parse_entry_id)]
        id: dsarc_archive::EntryId,

        /// Destination folder
        #[arg(default_value = ".")]
        dest: PathBuf,
    },

    /// Extract one chunk of an embedded MSND entry
    ExtractChunk {
        /// Archive file
        archive: PathBuf,

        /// Index of the MSND entry
        entry: usize,

        /// Chunk to extract
        #[arg(value_enum)]
        chunk: ChunkArg,

        /// Destination folder
        #[arg(default_value = ".")]
        dest: PathBuf,
    },

    /// Replace one chunk of an embedded MSND entry and save the archive
    ReplaceChunk {
        /// Archive file
        archive: PathBuf,

        /// Index of the MSND entry
        entry: usize,

        /// Chunk to replace
        #[arg(value_enum)]
        chunk: ChunkArg,

        /// File holding the new chunk bytes
        replacement: PathBuf,

        /// Working folder for staged entries (defaults to the replacement's folder)
        #[arg(long)]
        source_folder: Option<PathBuf>,

        /// Write the result here instead of over the archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild an archive from an extracted folder
    Rebuild {
        /// Extracted folder
        folder: PathBuf,

        /// Output archive file
        output: PathBuf,
    },

    /// Save an archive from a working folder
    ///
    /// With `--original`, entries missing from the folder are read from
    /// the original archive.
    Save {
        /// Working folder
        folder: PathBuf,

        /// Output archive file
        output: PathBuf,

        /// Archive the folder was exported from
        #[arg(long)]
        original: Option<PathBuf>,
    },

    /// Show the archive a folder would import as
    Inspect {
        /// Folder to inspect
        folder: PathBuf,
    },

    /// Recursively unpack an archive (or one entry) below a base folder
    UnpackNested {
        /// Archive file
        archive: PathBuf,

        /// Base folder searched for the output folder
        base: PathBuf,

        /// Unpack only this entry
        #[arg(long)]
        entry: Option<usize>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let level = Level::from(cli.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase())),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => ServiceConfig::from_json_file(path)?,
        None => ServiceConfig::default(),
    };
    let interrupt = Interrupt::install();
    let service = ArchiveService::new(config);

    match cli.command {
        Commands::Detect { path } => commands::inspect::detect(&path),
        Commands::Verify { path } => commands::inspect::verify(&path),
        Commands::List { archive, children } => {
            commands::inspect::list(service, &interrupt, archive, children).await
        }
        Commands::Inspect { folder } => {
            commands::inspect::inspect(service, &interrupt, folder).await
        }
        Commands::Extract {
            archive,
            dest,
            nested,
        } => {
            let service = if nested {
                ArchiveService::new(config.with_nested_extraction(true))
            } else {
                service
            };
            commands::extract::extract_all(service, &interrupt, archive, dest).await
        }
        Commands::ExtractEntry { archive, id, dest } => {
            commands::extract::extract_entry(service, &interrupt, archive, id, dest)
                .await
        }
        Commands::ExtractChunk {
            archive,
            entry,
            chunk,
            dest,
        } => {
            commands::extract::extract_chunk(
                service,
                &interrupt,
                archive,
                entry,
                chunk.into(),
                dest,
            )
            .await
        }
        Commands::ReplaceChunk {
            archive,
            entry,
            chunk,
            replacement,
            source_folder,
            output,
        } => {
            let args = commands::edit::ReplaceChunkArgs {
                archive,
                entry,
                chunk: chunk.into(),
                replacement,
                source_folder,
                output,
            };
            commands::edit::replace_chunk(service, &interrupt, args).await
        }
        Commands::Rebuild { folder, output } => {
            commands::edit::rebuild(service, &interrupt, folder, output).await
        }
        Commands::Save {
            folder,
            output,
            original,
        } => {
            commands::edit::save(service, &interrupt, folder, output, original)
                .await
        }
        Commands::UnpackNested {
            archive,
            base,
            entry,
        } => {
            commands::extract::unpack_nested(
                service,
                &interrupt,
                archive,
                entry,
                base,
            )
            .await
        }
    }
}
