//! # chipsim Core
//!
//! Core types and helpers shared by the chipsim front-ends:
//! typed simulation definitions, unit-qualified positions, layer-name
//! patterns, the material table and sweep post-processing.

pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod pattern;
pub mod post_process;
pub mod units;

pub use config::{
    excitations, metal_layers, AnalysisSetup, CrossSectionImport, Excitation, LayerMeshSize,
    LayerSpec, MeshOptimizer, MeshSizing, SimulationConfig, SolverSettings, Workflow,
};
pub use data::{MaterialProperties, MaterialTable, PropertyValue, PEC};
pub use error::{ConfigError, Error, Result};
pub use pattern::{match_layer, matching_layers};
pub use units::{format_length, format_position, Position};
