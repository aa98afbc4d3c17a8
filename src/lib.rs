//! # chipsim
//!
//! Tooling for simulating superconducting chip cross sections:
//! - scripting of a commercial field solver through object handles
//! - 2D cross-section meshing and Elmer solver input generation
//! - reading capacitance and inductance matrices back from solver output
//!
//! ## Architecture
//!
//! chipsim is organized as a workspace with multiple crates:
//!
//! 1. **chipsim-core** - Simulation definitions, units, materials, post-processing
//! 2. **chipsim-ansys** - Geometry and import scripting through script objects
//! 3. **chipsim-elmer** - Cross-section mesh, solver input files, result matrices
//! 4. **chipsim** - Command line binary that integrates all crates

pub mod commands;

pub use chipsim_ansys as ansys;
pub use chipsim_elmer as elmer;

pub use chipsim_core::{
    ConfigError, CrossSectionImport, Error, Excitation, LayerSpec, MaterialTable, Position,
    Result, SimulationConfig,
};

pub use chipsim_elmer::CrossSectionMatrices;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    // Command output goes to stdout, so logs go to stderr
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!("chipsim {} (built {})", VERSION, BUILD_DATE);
    Ok(())
}
