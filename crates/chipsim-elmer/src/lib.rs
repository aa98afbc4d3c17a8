//! # chipsim Elmer
//!
//! 2D cross-section workflow for the Elmer FEM solver:
//! - layout loading and polygon preparation
//! - mesh production through a [`MeshEngine`] handle, with [`GmshProcess`]
//!   running the gmsh executable
//! - solver input files
//! - capacitance and inductance matrices from the solver output

pub mod engine;
pub mod gmsh;
pub mod layout;
pub mod mesh;
pub mod results;
pub mod sif;

pub use engine::{DimTag, MeshEngine, SearchBox};
pub use gmsh::GmshProcess;
pub use layout::{read_gds, separated_hull_and_holes, BoundingBox, HullAndHoles, Layout};
pub use mesh::{
    apply_mesh_sizing, build_cross_section_mesh, outer_boundaries, produce_cross_section_mesh,
    recursive_children, NamedDimTags,
};
pub use results::{get_cross_section_capacitance_and_inductance, CrossSectionMatrices, Matrix};
pub use sif::{
    declared_post_file, produce_cross_section_sif_files, produce_cross_section_sif_files_with,
    ElmerTemplates, SifTemplates, CIRCUIT_DEFINITIONS_FILE,
};
