//! blockpack CLI
//!
//! Command-line front end: parses flags, builds one `Operation`, runs it and
//! maps the outcome to an exit status (0 ok, 1 fatal, 2 some items failed).

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use blockpack::{Config, Engine, InputSource, Operation, Outcome, PackError, STDIN_NAME};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// blockpack
#[derive(Parser, Debug)]
#[command(name = "blockpack")]
#[command(about = "Pack files into a single block container")]
#[command(version)]
struct Args {
    /// Verbosity: -v reports each item, -vv also traces block I/O and timing
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a container (reads stdin when no files are given)
    Create {
        /// Container path
        archive: PathBuf,

        /// Files to pack
        files: Vec<PathBuf>,

        /// Data block size in bytes
        #[arg(long, default_value = "262144")]
        block_size: u32,

        /// Metadata table capacity
        #[arg(long, default_value = "100")]
        max_entries: u32,

        /// Maximum blocks per entry
        #[arg(long, default_value = "1024")]
        max_blocks_per_entry: u32,

        /// Free block registry capacity
        #[arg(long, default_value = "16384")]
        max_free_blocks: u32,
    },

    /// Add files to a container (reads stdin when no files are given)
    Append {
        /// Container path
        archive: PathBuf,

        /// Files to pack
        files: Vec<PathBuf>,
    },

    /// Re-pack entries from the files of the same name
    Update {
        /// Container path
        archive: PathBuf,

        /// Entry names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Remove entries
    Delete {
        /// Container path
        archive: PathBuf,

        /// Entry names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Extract entries (all when no names are given)
    Extract {
        /// Container path
        archive: PathBuf,

        /// Entry names
        names: Vec<String>,

        /// Destination directory
        #[arg(short = 'C', long, default_value = ".")]
        directory: PathBuf,

        /// Write content to stdout instead of files
        #[arg(long)]
        to_stdout: bool,
    },

    /// List entries
    List {
        /// Container path
        archive: PathBuf,
    },

    /// Compact the container
    Defragment {
        /// Container path
        archive: PathBuf,
    },
}

/// Output verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity {
    Quiet,
    Verbose,
    VeryVerbose,
}

impl From<u8> for Verbosity {
    fn from(count: u8) -> Self {
        match count {
            0 => Verbosity::Quiet,
            1 => Verbosity::Verbose,
            _ => Verbosity::VeryVerbose,
        }
    }
}

impl Verbosity {
    fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Verbose => "blockpack=info",
            Verbosity::VeryVerbose => "blockpack=trace",
        }
    }
}

fn main() {
    let args = Args::parse();
    let verbosity = Verbosity::from(args.verbose);

    // Initialize tracing/logging; stdout may carry extracted content
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));

    fmt()
        .with_env_filter(filter)
        .with_target(verbosity == Verbosity::VeryVerbose)
        .with_writer(io::stderr)
        .init();

    let started = Instant::now();

    let code = match run(args.command, verbosity) {
        Ok(true) => 0,
        Ok(false) => 2,
        Err((archive, e)) => {
            eprintln!("blockpack: {}: {}", archive.display(), e);
            1
        }
    };

    if verbosity == Verbosity::VeryVerbose {
        eprintln!("elapsed: {:.3?}", started.elapsed());
    }

    exit(code);
}

/// Run one command; `Ok(false)` means some items failed
fn run(command: Commands, verbosity: Verbosity) -> Result<bool, (PathBuf, PackError)> {
    let mut engine = Engine::default();

    let operation = match command {
        Commands::Create {
            archive,
            files,
            block_size,
            max_entries,
            max_blocks_per_entry,
            max_free_blocks,
        } => {
            let config = Config::builder()
                .block_size(block_size)
                .max_entries(max_entries)
                .max_blocks_per_entry(max_blocks_per_entry)
                .max_free_blocks(max_free_blocks)
                .build();
            engine = Engine::new(config);
            Operation::Create {
                archive,
                inputs: inputs_for(files),
            }
        }
        Commands::Append { archive, files } => Operation::Append {
            archive,
            inputs: inputs_for(files),
        },
        Commands::Update { archive, names } => Operation::Update { archive, names },
        Commands::Delete { archive, names } => Operation::Delete { archive, names },
        Commands::Extract {
            archive,
            names,
            to_stdout: true,
            ..
        } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let report = engine
                .extract_to_writer(&archive, &names, &mut out)
                .map_err(|e| (archive.clone(), e))?;
            return Ok(print_outcome(Outcome::Batch(report), verbosity));
        }
        Commands::Extract {
            archive,
            names,
            directory,
            ..
        } => Operation::Extract {
            archive,
            destination: directory,
            names,
        },
        Commands::List { archive } => Operation::List {
            archive,
            verbose: verbosity >= Verbosity::Verbose,
        },
        Commands::Defragment { archive } => Operation::Defragment { archive },
    };

    let archive = operation.archive().clone();
    let outcome = engine.execute(operation).map_err(|e| (archive, e))?;
    Ok(print_outcome(outcome, verbosity))
}

/// Files become named inputs; no files means a single stdin stream
fn inputs_for(files: Vec<PathBuf>) -> Vec<InputSource> {
    if files.is_empty() {
        vec![InputSource::stream(STDIN_NAME, io::stdin())]
    } else {
        files.into_iter().map(InputSource::file).collect()
    }
}

/// Print an outcome; returns false if any item failed
fn print_outcome(outcome: Outcome, verbosity: Verbosity) -> bool {
    let clean = !outcome.has_failures();

    match outcome {
        Outcome::Batch(report) => {
            for failure in &report.failures {
                eprintln!("blockpack: {}", failure);
            }
        }
        Outcome::Listing { entries, verbose } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for entry in &entries {
                // A closed pipe just ends the listing
                if writeln!(out, "{}", entry.render(verbose)).is_err() {
                    break;
                }
            }
        }
        Outcome::Defragmented(report) => {
            if verbosity >= Verbosity::Verbose {
                println!(
                    "moved {} of {} blocks, reclaimed {} bytes",
                    report.blocks_moved,
                    report.live_blocks,
                    report.reclaimed()
                );
            }
        }
    }

    clean
}
