use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::Path;

mod algebra;
mod batch;
mod config;
mod dsl;
mod error;
mod id;
mod interp;
mod report;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "structgen")]
#[command(about = "Structure-set scripting DSL interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a structure script against a structure-set manifest.
    Apply {
        /// Structure-set manifest (JSON).
        #[arg(long)]
        set: String,

        /// Script file, one instruction per line.
        #[arg(long)]
        script: String,

        /// Write the JSON report here instead of stdout.
        #[arg(short = 'o', long)]
        out: Option<String>,

        /// Config file (defaults to ./structgen.json when present).
        #[arg(long)]
        config: Option<String>,

        /// Remove structures created by a failing line.
        #[arg(long)]
        atomic_lines: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Apply {
            set,
            script,
            out,
            config,
            atomic_lines,
        } => {
            // 1) Load config; CLI flags take precedence.
            let cfg = config::Config::load(config.as_deref().map(Path::new))?;

            // 2) Parse + validate the structure-set manifest.
            let manifest: algebra::Manifest = serde_json::from_str(
                &std::fs::read_to_string(&set)
                    .with_context(|| format!("read structure-set manifest {set}"))?,
            )?;
            let mut volumes = algebra::ExprAlgebra::from_manifest(&manifest)?;

            // 3) Run the script, resolving it against the configured
            //    default directory when needed.
            let script_path = cfg.resolve_script(Path::new(&script));
            let options = batch::BatchOptions {
                atomic_lines: atomic_lines || cfg.atomic_lines,
            };
            let lines = batch::run_script_file(&mut volumes, &script_path, options)?;

            // 4) Serialize the report.
            let data = report::build_report(&volumes, lines);
            let json = serde_json::to_string_pretty(&data)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Wrote {}", path);
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}
