use chipsim::{commands, init_logging};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chipsim", version, about = "Chip cross-section simulation tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the Elmer solver input files of a cross-section definition
    Sif {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value = ".")]
        folder: PathBuf,
    },
    /// Mesh a cross-section definition with gmsh
    Mesh {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// gmsh executable to run instead of the one on the search path
        #[arg(long)]
        gmsh: Option<PathBuf>,
    },
    /// Print the capacitance and inductance matrices of a finished run as JSON
    Results {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value = ".")]
        folder: PathBuf,
    },
    /// Print the solver script of a cross-section import without running it
    AnsysScript {
        #[arg(long)]
        config: PathBuf,
    },
    /// Tabulate sweep results against the varied parameters into a CSV file
    Tabulate {
        #[arg(long)]
        output: PathBuf,
        /// JSON object of `{definition prefix: {layer: value}}`
        #[arg(long)]
        data: PathBuf,
        #[arg(required = true)]
        definitions: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    match Cli::parse().command {
        Command::Sif { config, folder } => {
            for file in commands::write_sif_files(&config, &folder)? {
                println!("{}", folder.join(file).display());
            }
        }
        Command::Mesh { config, output, gmsh } => {
            commands::write_mesh(&config, &output, gmsh.as_deref())?;
            println!("{}", output.display());
        }
        Command::Results { config, folder } => {
            println!("{}", commands::results_json(&config, &folder)?);
        }
        Command::AnsysScript { config } => {
            for line in commands::ansys_script(&config)? {
                println!("{}", line);
            }
        }
        Command::Tabulate {
            output,
            data,
            definitions,
        } => {
            commands::tabulate(&output, &data, &definitions)?;
            tracing::info!("Wrote {}", output.display());
        }
    }

    Ok(())
}
