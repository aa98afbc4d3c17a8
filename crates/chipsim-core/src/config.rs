//! Simulation definitions
//!
//! Typed counterparts of the JSON definition files produced by the layout
//! export step. Two definitions exist:
//! - [`SimulationConfig`] drives the cross-section mesh, the Elmer input files
//!   and the result parser
//! - [`CrossSectionImport`] drives the geometry import into Ansys
//!
//! Both share the layer description ([`LayerSpec`]), the material table and
//! the mesh-size settings.

use crate::data::MaterialTable;
use crate::error::{ConfigError, Error, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Electrical role of a metal layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Excitation {
    /// Reference ground, written as `0`
    Ground,
    /// Signal conductor `n` (n > 0)
    Signal(u32),
    /// Floating conductor, written as `null`
    Floating,
}

impl Excitation {
    /// Map the raw JSON value to an excitation
    pub fn from_raw(raw: Option<u32>) -> Self {
        match raw {
            None => Excitation::Floating,
            Some(0) => Excitation::Ground,
            Some(n) => Excitation::Signal(n),
        }
    }

    /// Raw JSON value of the excitation
    pub fn raw(&self) -> Option<u32> {
        match self {
            Excitation::Ground => Some(0),
            Excitation::Signal(n) => Some(*n),
            Excitation::Floating => None,
        }
    }
}

impl fmt::Display for Excitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw() {
            Some(n) => write!(f, "{}", n),
            None => write!(f, "None"),
        }
    }
}

impl Serialize for Excitation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.raw() {
            Some(n) => serializer.serialize_u32(n),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Excitation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<u32>::deserialize(deserializer).map(Excitation::from_raw)
    }
}

// A present `"excitation": null` must become `Some(Floating)`, not `None`.
fn deserialize_present_excitation<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Excitation>, D::Error>
where
    D: Deserializer<'de>,
{
    Excitation::deserialize(deserializer).map(Some)
}

/// One layer of the cross-section or import definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Source layer number in the layout file (datatype 0)
    pub layer: u32,
    /// Excitation of a metal layer; absent for dielectric layers
    #[serde(
        default,
        deserialize_with = "deserialize_present_excitation",
        skip_serializing_if = "Option::is_none"
    )]
    pub excitation: Option<Excitation>,
    /// Material name, looked up in the material table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

impl LayerSpec {
    /// Dielectric (non-metal) layer
    pub fn dielectric(layer: u32, material: impl Into<String>) -> Self {
        Self {
            layer,
            excitation: None,
            material: Some(material.into()),
        }
    }

    /// Metal layer with the given excitation
    pub fn metal(layer: u32, excitation: Excitation) -> Self {
        Self {
            layer,
            excitation: Some(excitation),
            material: None,
        }
    }

    /// True for layers that carry an excitation
    pub fn is_metal(&self) -> bool {
        self.excitation.is_some()
    }
}

/// Layers that carry an excitation, in definition order
pub fn metal_layers(layers: &IndexMap<String, LayerSpec>) -> IndexMap<&str, &LayerSpec> {
    layers
        .iter()
        .filter(|(_, spec)| spec.is_metal())
        .map(|(name, spec)| (name.as_str(), spec))
        .collect()
}

/// Distinct excitations of the metal layers, sorted
pub fn excitations(layers: &IndexMap<String, LayerSpec>) -> Vec<Excitation> {
    let mut found: Vec<Excitation> = layers.values().filter_map(|s| s.excitation).collect();
    found.sort();
    found.dedup();
    found
}

/// Mesh size of the layers matched by one pattern
///
/// Either a plain element size or `[size, expansion_rate, boundary_distance]`
/// where the trailing entries are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerMeshSize {
    /// Constant element size
    Size(f64),
    /// Size growing away from the layer
    Graded(Vec<f64>),
}

impl LayerMeshSize {
    /// Element size next to the layer
    pub fn size(&self) -> Option<f64> {
        match self {
            LayerMeshSize::Size(size) => Some(*size),
            LayerMeshSize::Graded(values) => values.first().copied(),
        }
    }

    /// Growth rate of the element size away from the layer
    pub fn expansion_rate(&self) -> Option<f64> {
        match self {
            LayerMeshSize::Size(_) => None,
            LayerMeshSize::Graded(values) => values.get(1).copied(),
        }
    }

    /// Distance over which the size is kept constant
    pub fn boundary_distance(&self) -> Option<f64> {
        match self {
            LayerMeshSize::Size(_) => None,
            LayerMeshSize::Graded(values) => values.get(2).copied(),
        }
    }
}

/// Mesh-size settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSizing {
    /// Upper bound for every element size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_max: Option<f64>,
    /// Thread count for the mesher
    #[serde(
        default,
        rename = "gmsh_n_threads",
        skip_serializing_if = "Option::is_none"
    )]
    pub n_threads: Option<u32>,
    /// Sizes keyed by layer pattern (see [`crate::pattern::match_layer`])
    #[serde(flatten)]
    pub layers: IndexMap<String, LayerMeshSize>,
}

/// Workflow switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workflow {
    /// Open the interactive mesh viewer after meshing
    pub run_gmsh_gui: bool,
    /// Switches consumed by other tools of the workflow
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// Mesh optimisation pass applied after generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptimizer {
    /// Optimiser name understood by the mesher, empty for the default
    pub method: String,
    /// Apply the optimisation even to invalid elements
    pub force: bool,
    /// Number of iterations
    pub niter: u32,
}

impl Default for MeshOptimizer {
    fn default() -> Self {
        Self {
            method: String::new(),
            force: false,
            niter: 1,
        }
    }
}

/// Linear system settings of the FEM solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Iterative method name
    pub linear_system_method: String,
    /// Iteration limit
    pub max_iterations: u32,
    /// Convergence tolerance
    pub convergence_tolerance: f64,
    /// Polynomial order of the elements
    pub p_element_order: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            linear_system_method: "BiCGStab".to_string(),
            max_iterations: 500,
            convergence_tolerance: 1.0e-10,
            p_element_order: 1,
        }
    }
}

fn default_units() -> String {
    "um".to_string()
}

fn default_mesh_name() -> String {
    "cross_section".to_string()
}

fn default_sif_names() -> Vec<String> {
    vec!["capacitance".to_string(), "inductance".to_string()]
}

fn default_gds_scaling() -> f64 {
    1.0
}

/// Read a JSON definition file
fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.extension().is_some_and(|ext| ext == "json") {
        return Err(ConfigError::UnsupportedFormat(path.display().to_string()).into());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a JSON definition file
fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn invalid(key: &str, reason: &str) -> Error {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn validate_layers(layers: &IndexMap<String, LayerSpec>) -> Result<()> {
    if layers.is_empty() {
        return Err(ConfigError::MissingKey("layers".to_string()).into());
    }
    if let Some(name) = layers.keys().find(|name| name.is_empty()) {
        return Err(invalid("layers", &format!("empty layer name '{}'", name)));
    }
    Ok(())
}

/// Cross-section simulation definition (mesh, solver files, results)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Layout file holding the cross-section polygons
    pub gds_file: PathBuf,
    /// Length unit of the layout coordinates
    #[serde(default = "default_units")]
    pub units: String,
    /// Layers by name
    pub layers: IndexMap<String, LayerSpec>,
    /// Material properties by name
    #[serde(default)]
    pub material_dict: MaterialTable,
    /// Mesh-size settings
    #[serde(default)]
    pub mesh_size: MeshSizing,
    /// Workflow switches
    #[serde(default)]
    pub workflow: Workflow,
    /// Base names of the solver input files (capacitance, inductance)
    #[serde(default = "default_sif_names")]
    pub sif_names: Vec<String>,
    /// Also simulate inductance
    #[serde(default)]
    pub run_inductance_sim: bool,
    /// Optional mesh optimisation pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_optimizer: Option<MeshOptimizer>,
    /// London penetration depth of the superconductor; zero disables
    /// kinetic-inductance modelling
    #[serde(default)]
    pub london_penetration_depth: f64,
    /// Mesh database name the solver reads
    #[serde(default = "default_mesh_name")]
    pub mesh_name: String,
    /// Linear system settings
    #[serde(default)]
    pub solver: SolverSettings,
}

impl SimulationConfig {
    /// Minimal definition with the given layout and layers
    pub fn new(gds_file: impl Into<PathBuf>, layers: IndexMap<String, LayerSpec>) -> Self {
        Self {
            gds_file: gds_file.into(),
            units: default_units(),
            layers,
            material_dict: MaterialTable::default(),
            mesh_size: MeshSizing::default(),
            workflow: Workflow::default(),
            sif_names: default_sif_names(),
            run_inductance_sim: false,
            mesh_optimizer: None,
            london_penetration_depth: 0.0,
            mesh_name: default_mesh_name(),
            solver: SolverSettings::default(),
        }
    }

    /// Load and validate a definition file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config: Self = load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and save to a definition file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;
        save_json(self, path)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_layers(&self.layers)?;
        if self.sif_names.is_empty() {
            return Err(ConfigError::MissingKey("sif_names".to_string()).into());
        }
        if self.run_inductance_sim && self.sif_names.len() < 2 {
            return Err(invalid(
                "sif_names",
                "inductance simulation needs a second file name",
            ));
        }
        if self.units.is_empty() {
            return Err(invalid("units", "must not be empty"));
        }
        if !(self.london_penetration_depth >= 0.0) {
            return Err(invalid("london_penetration_depth", "must be non-negative"));
        }
        Ok(())
    }

    /// Kinetic inductance is modelled with the London equations
    pub fn use_london_equations(&self) -> bool {
        self.london_penetration_depth > 0.0
    }

    /// Layers that carry an excitation
    pub fn metal_layers(&self) -> IndexMap<&str, &LayerSpec> {
        metal_layers(&self.layers)
    }
}

/// Adaptive solution settings of the 2D matrix extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSetup {
    /// Adaptive frequency value
    pub frequency: f64,
    /// Unit of `frequency`
    pub frequency_units: String,
    /// Maximum number of adaptive passes
    pub maximum_passes: u32,
    /// Minimum number of adaptive passes
    pub minimum_passes: u32,
    /// Converged passes required
    pub minimum_converged_passes: u32,
    /// Target error in percent
    pub percent_error: f64,
    /// Refinement per pass in percent
    pub percent_refinement: f64,
}

impl Default for AnalysisSetup {
    fn default() -> Self {
        Self {
            frequency: 5.0,
            frequency_units: "GHz".to_string(),
            maximum_passes: 12,
            minimum_passes: 1,
            minimum_converged_passes: 1,
            percent_error: 0.1,
            percent_refinement: 30.0,
        }
    }
}

/// Cross-section geometry import into the 3D EM solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionImport {
    /// Layout file, relative to the definition file
    pub gds_file: PathBuf,
    /// Model units
    #[serde(default = "default_units")]
    pub units: String,
    /// Layers by name
    pub layers: IndexMap<String, LayerSpec>,
    /// Material properties by name
    #[serde(default)]
    pub material_dict: MaterialTable,
    /// Scaling applied to the imported sheets
    #[serde(default = "default_gds_scaling")]
    pub gds_scaling: f64,
    /// Maximum element lengths keyed by layer pattern
    #[serde(default)]
    pub mesh_size: MeshSizing,
    /// Solution setup
    #[serde(default)]
    pub analysis_setup: AnalysisSetup,
    /// Add energy integrals of the dielectric layers to the fields calculator
    #[serde(default)]
    pub integrate_energies: bool,
}

impl CrossSectionImport {
    /// Load and validate a definition file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let import: Self = load_json(path)?;
        import.validate()?;
        Ok(import)
    }

    /// Validate and save to a definition file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;
        save_json(self, path)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_layers(&self.layers)?;
        if !(self.gds_scaling > 0.0) {
            return Err(invalid("gds_scaling", "must be positive"));
        }
        if self.units.is_empty() {
            return Err(invalid("units", "must not be empty"));
        }
        Ok(())
    }

    /// Layers that carry an excitation
    pub fn metal_layers(&self) -> IndexMap<&str, &LayerSpec> {
        metal_layers(&self.layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "gds_file": "cross_section.gds",
        "layers": {
            "substrate": {"layer": 1, "material": "si"},
            "signal": {"layer": 2, "excitation": 1},
            "ground": {"layer": 3, "excitation": 0},
            "island": {"layer": 4, "excitation": null}
        },
        "material_dict": {"si": {"permittivity": 11.45}},
        "mesh_size": {"global_max": 10.0, "signal*": [0.5, 1.2], "substrate": 2.0},
        "workflow": {"run_gmsh_gui": true, "run_elmer": true},
        "sif_names": ["capacitance", "inductance"],
        "run_inductance_sim": true
    }"#;

    #[test]
    fn test_parse_excitations() {
        let config: SimulationConfig = serde_json::from_str(SAMPLE).expect("valid config");
        assert_eq!(config.layers["substrate"].excitation, None);
        assert_eq!(config.layers["signal"].excitation, Some(Excitation::Signal(1)));
        assert_eq!(config.layers["ground"].excitation, Some(Excitation::Ground));
        assert_eq!(config.layers["island"].excitation, Some(Excitation::Floating));
        assert_eq!(config.metal_layers().len(), 3);
    }

    #[test]
    fn test_defaults_and_sections() {
        let config: SimulationConfig = serde_json::from_str(SAMPLE).expect("valid config");
        assert_eq!(config.units, "um");
        assert_eq!(config.mesh_name, "cross_section");
        assert!(config.workflow.run_gmsh_gui);
        assert!(config.workflow.extra.contains_key("run_elmer"));
        assert_eq!(config.mesh_size.global_max, Some(10.0));
        assert_eq!(config.mesh_size.layers.len(), 2);
        assert_eq!(config.mesh_size.layers["signal*"].expansion_rate(), Some(1.2));
        assert!(!config.use_london_equations());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_excitation_serialization_roundtrip() {
        let config: SimulationConfig = serde_json::from_str(SAMPLE).expect("valid config");
        let json = serde_json::to_string(&config).expect("serializable");
        let again: SimulationConfig = serde_json::from_str(&json).expect("valid config");
        assert_eq!(config, again);
    }

    #[test]
    fn test_excitations_sorted_and_distinct() {
        let config: SimulationConfig = serde_json::from_str(SAMPLE).expect("valid config");
        assert_eq!(
            excitations(&config.layers),
            vec![Excitation::Ground, Excitation::Signal(1), Excitation::Floating]
        );
        assert_eq!(Excitation::Floating.to_string(), "None");
        assert_eq!(Excitation::Signal(2).to_string(), "2");
    }

    #[test]
    fn test_validation_rejects_missing_inductance_name() {
        let mut config: SimulationConfig = serde_json::from_str(SAMPLE).expect("valid config");
        config.sif_names.truncate(1);
        assert!(config.validate().is_err());
        config.run_inductance_sim = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_negative_london_depth() {
        let mut config: SimulationConfig = serde_json::from_str(SAMPLE).expect("valid config");
        config.london_penetration_depth = -1.0;
        assert!(config.validate().is_err());
        config.london_penetration_depth = 5e-8;
        assert!(config.validate().is_ok());
        assert!(config.use_london_equations());
    }

    #[test]
    fn test_sif_names_default() {
        let json = r#"{
            "gds_file": "cross_section.gds",
            "layers": {"signal": {"layer": 2, "excitation": 1}},
            "run_inductance_sim": true
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).expect("valid config");
        assert_eq!(config.sif_names, vec!["capacitance", "inductance"]);
        assert_eq!(config.sif_names, SimulationConfig::new("cs.gds", IndexMap::new()).sif_names);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_import_defaults() {
        let json = r#"{
            "gds_file": "layout.gds",
            "layers": {"signal": {"layer": 2, "excitation": 1, "material": "pec"}}
        }"#;
        let import: CrossSectionImport = serde_json::from_str(json).expect("valid import");
        assert_eq!(import.gds_scaling, 1.0);
        assert_eq!(import.analysis_setup, AnalysisSetup::default());
        assert!(!import.integrate_energies);
        assert!(import.validate().is_ok());
    }
}
