//! Mesh engine handle
//!
//! The mesher is an external library with a global model. [`MeshEngine`]
//! exposes the subset of its API the cross-section producer needs, so the
//! producer can run against the real library binding or against a test
//! double.

use chipsim_core::{MeshOptimizer, Result};
use std::fmt;
use std::path::Path;

/// Geometric entity of the mesher's model: dimension and tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimTag {
    pub dim: i32,
    pub tag: i32,
}

impl DimTag {
    pub fn new(dim: i32, tag: i32) -> Self {
        Self { dim, tag }
    }

    /// Surface entity
    pub fn surface(tag: i32) -> Self {
        Self::new(2, tag)
    }

    /// Curve entity
    pub fn curve(tag: i32) -> Self {
        Self::new(1, tag)
    }
}

impl From<(i32, i32)> for DimTag {
    fn from((dim, tag): (i32, i32)) -> Self {
        Self { dim, tag }
    }
}

impl fmt::Display for DimTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.dim, self.tag)
    }
}

/// Search box `[x_min, y_min, z_min, x_max, y_max, z_max]`
pub type SearchBox = [f64; 6];

/// Operations of the mesh engine used by the cross-section producer
///
/// Methods map one-to-one onto engine API calls. Errors of the binding are
/// returned unchanged.
pub trait MeshEngine {
    /// Start the engine session
    fn initialize(&mut self) -> Result<()>;

    /// Create and select a new model
    fn add_model(&mut self, name: &str) -> Result<()>;

    /// Create a plane surface bounded by the closed polyline through `points`
    ///
    /// Returns the surface tag.
    fn add_polygon(&mut self, points: &[[f64; 3]]) -> Result<i32>;

    /// Boolean difference; returns the resulting entities
    fn cut(&mut self, objects: &[DimTag], tools: &[DimTag]) -> Result<Vec<DimTag>>;

    /// Boolean fragment
    ///
    /// Returns all resulting entities and, for every input entity (objects
    /// then tools), the entities it was split into.
    fn fragment(
        &mut self,
        objects: &[DimTag],
        tools: &[DimTag],
        remove_tool: bool,
    ) -> Result<(Vec<DimTag>, Vec<Vec<DimTag>>)>;

    /// Push the geometry kernel state to the model
    fn synchronize(&mut self) -> Result<()>;

    /// Direct boundary entities of `dim_tags`, each listed once
    fn boundary(&mut self, dim_tags: &[DimTag]) -> Result<Vec<DimTag>>;

    /// Entities of dimension `dim` inside the search box
    fn entities_in_bounding_box(&mut self, search: SearchBox, dim: i32) -> Result<Vec<DimTag>>;

    /// Create a named physical group; returns its tag
    fn add_physical_group(&mut self, dim: i32, tags: &[i32], name: &str) -> Result<i32>;

    /// Set a numeric engine option
    fn set_option_number(&mut self, name: &str, value: f64) -> Result<()>;

    /// Add a mesh size field of the given kind; returns its tag
    fn add_field(&mut self, kind: &str) -> Result<i32>;

    /// Set a numeric field option
    fn set_field_number(&mut self, field: i32, option: &str, value: f64) -> Result<()>;

    /// Set a list-valued field option
    fn set_field_numbers(&mut self, field: i32, option: &str, values: &[f64]) -> Result<()>;

    /// Use `field` as the background size field
    fn set_background_field(&mut self, field: i32) -> Result<()>;

    /// Generate the mesh up to dimension `dim`
    fn generate(&mut self, dim: i32) -> Result<()>;

    /// Run a mesh optimiser
    fn optimize(&mut self, optimizer: &MeshOptimizer) -> Result<()>;

    /// Write the mesh to `path`
    fn write(&mut self, path: &Path) -> Result<()>;

    /// Open the interactive viewer and block until it is closed
    fn run_gui(&mut self) -> Result<()>;

    /// End the engine session
    fn finalize(&mut self) -> Result<()>;
}
