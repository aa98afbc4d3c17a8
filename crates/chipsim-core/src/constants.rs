//! Physical constants and fixed simulation parameters.

/// Vacuum permittivity ε₀ in F/m (CODATA 2018).
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_812_8e-12;
/// Vacuum permeability μ₀ in H/m (CODATA 2018).
pub const VACUUM_PERMEABILITY: f64 = 1.256_637_062_12e-6;

/// Angular frequency (rad/s) of cross-section inductance simulations.
///
/// Large enough for the inductive response to be measurable, small enough not
/// to affect the quasi-static result.
pub const INDUCTANCE_ANGULAR_FREQUENCY: f64 = 5e2;

/// Tolerance used when searching outer boundary edges by bounding box.
pub const BOUNDARY_SEARCH_TOLERANCE: f64 = 1e-6;
