//! conddb CLI
//!
//! Command-line access to a conditions database:
//! - Browse and edit detector trees
//! - Query conditions
//! - List fills, runs and files
//! - Show any entity as JSON

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use conddb::{
    config::generate_default_config, logging, time::format_timestamp, ApiFactory, Brick,
    Condition, ConditionsDb, Config, Detector, Emulsion, EntityKind, File, Fill, Run, TimeArg,
};

#[derive(Parser)]
#[command(name = "conddb")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Conditions database for detector calibration and run bookkeeping")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List detector trees, or the subdetectors of PARENT
    Detectors {
        parent: Option<String>,
        /// Levels to descend
        #[arg(short, long, default_value = "1")]
        depth: usize,
    },

    /// Inspect or edit a single detector
    Detector {
        #[command(subcommand)]
        action: DetectorAction,
    },

    /// Query the conditions of a detector
    Conditions {
        /// Detector path, e.g. SND/MuFilter/Veto
        path: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        tag: Option<String>,
        /// Only conditions valid at this time (requires --name)
        #[arg(short, long)]
        at: Option<String>,
    },

    /// List fills
    Fills {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },

    /// List runs
    Runs {
        /// Only runs of this fill
        #[arg(long)]
        fill: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },

    /// List files
    Files {
        /// Only files of this run
        #[arg(long)]
        run: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },

    /// Show one entity (fill, run, file, emulsion, brick)
    Show { kind: String, id: String },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DetectorAction {
    /// Print a detector with its subtree and conditions
    Show { path: String },
    /// Add a detector; without --parent a new tree is created
    Add {
        name: String,
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Remove a detector and its subtree
    Remove { path: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_deref());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    logging::init(&config.logging)?;

    let db = ApiFactory::construct(&config)?;
    let result = run(&db, cli.command, cli.format);
    db.shutdown()?;
    result
}

fn run(db: &ConditionsDb, command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Detectors { parent, depth } => {
            let parent = parent.unwrap_or_default();
            let paths = db.list_detectors(&parent)?;
            if format == OutputFormat::Json {
                return print_json(&paths);
            }
            for path in paths {
                print_detector_tree(db, &path, depth.max(1), 0)?;
            }
        }

        Commands::Detector { action } => match action {
            DetectorAction::Show { path } => {
                let detector = db.get_detector(&path)?;
                if format == OutputFormat::Json {
                    return print_json(&detector);
                }
                print_detector(&path, &detector);
            }
            DetectorAction::Add { name, parent } => {
                db.add_detector(&name, parent.as_deref())?;
                match parent {
                    Some(parent) => println!("Added {}/{}", parent.trim_matches('/'), name),
                    None => println!("Added {}", name),
                }
            }
            DetectorAction::Remove { path } => {
                db.remove_detector(&path)?;
                println!("Removed {}", path);
            }
        },

        Commands::Conditions {
            path,
            name,
            tag,
            at,
        } => {
            let conditions = match (name, tag, at) {
                (Some(name), _, Some(at)) => {
                    db.get_conditions_by_name_and_validity(&path, &name, at, None)?
                }
                (None, _, Some(_)) => bail!("--at requires --name"),
                (Some(name), Some(tag), None) => db
                    .get_condition_by_name_and_tag(&path, &name, &tag)?
                    .into_iter()
                    .collect(),
                (Some(name), None, None) => db.get_conditions_by_name(&path, &name)?,
                (None, Some(tag), None) => db.get_conditions_by_tag(&path, &tag)?,
                (None, None, None) => db.get_conditions(&path)?,
            };
            if format == OutputFormat::Json {
                return print_json(&conditions);
            }
            print_conditions(&conditions);
        }

        Commands::Fills { start, end } => {
            print_ids(db.list_fills(start.map(TimeArg::from), end.map(TimeArg::from))?, format)?;
        }
        Commands::Runs { fill, start, end } => {
            print_ids(
                db.list_runs(fill.as_deref(), start.map(TimeArg::from), end.map(TimeArg::from))?,
                format,
            )?;
        }
        Commands::Files { run, start, end } => {
            print_ids(
                db.list_files(run.as_deref(), start.map(TimeArg::from), end.map(TimeArg::from))?,
                format,
            )?;
        }

        Commands::Show { kind, id } => {
            let Some(kind) = EntityKind::parse(&kind) else {
                bail!("Unknown kind '{}' (expected fill, run, file, emulsion or brick)", kind);
            };
            // Entities are always printed as JSON
            match kind {
                EntityKind::Fill => print_json(&db.registry().get::<Fill>(&id)?)?,
                EntityKind::Run => print_json(&db.registry().get::<Run>(&id)?)?,
                EntityKind::File => print_json(&db.registry().get::<File>(&id)?)?,
                EntityKind::Emulsion => print_json(&db.registry().get::<Emulsion>(&id)?)?,
                EntityKind::Brick => print_json(&db.registry().get::<Brick>(&id)?)?,
            }
        }

        Commands::Config { output } => write_default_config(output.as_deref())?,
    }

    Ok(())
}

fn write_default_config(output: Option<&Path>) -> Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Config written to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_ids(ids: Vec<String>, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(&ids);
    }
    if ids.is_empty() {
        println!("(none)");
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

fn print_detector_tree(db: &ConditionsDb, path: &str, depth: usize, level: usize) -> Result<()> {
    let detector = db.get_detector(path)?;
    println!(
        "{}{}  ({} conditions)",
        "  ".repeat(level),
        detector.name,
        detector.conditions.len()
    );
    if depth > 1 {
        for child in db.list_detectors(path)? {
            print_detector_tree(db, &child, depth - 1, level + 1)?;
        }
    }
    Ok(())
}

fn print_detector(path: &str, detector: &Detector) {
    println!("Detector: {}", path);
    println!("  Subdetectors: {}", detector.subdetectors.len());
    for child in &detector.subdetectors {
        println!("    {}", child.name);
    }
    println!("  Conditions:   {}", detector.conditions.len());
    print_conditions(&detector.conditions);
}

fn print_conditions(conditions: &[Condition]) {
    println!(
        "{:<20} {:<12} {:<12} {:<20} {:<20}",
        "NAME", "TAG", "TYPE", "VALID SINCE", "VALID UNTIL"
    );
    for c in conditions {
        println!(
            "{:<20} {:<12} {:<12} {:<20} {:<20}",
            c.name,
            c.tag,
            c.condition_type.as_deref().unwrap_or("-"),
            format_timestamp(&c.valid_since),
            format_timestamp(&c.valid_until),
        );
    }
}
