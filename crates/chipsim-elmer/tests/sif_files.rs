use chipsim_core::{Excitation, LayerSpec, MaterialProperties, Result, SimulationConfig};
use chipsim_elmer::{
    declared_post_file, produce_cross_section_sif_files, produce_cross_section_sif_files_with,
    SifTemplates, CIRCUIT_DEFINITIONS_FILE,
};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::path::Path;

fn config() -> SimulationConfig {
    let mut layers = IndexMap::new();
    layers.insert("signal".to_string(), LayerSpec::metal(10, Excitation::Signal(1)));
    layers.insert("ground".to_string(), LayerSpec::metal(11, Excitation::Ground));
    layers.insert("substrate".to_string(), LayerSpec::dielectric(20, "silicon"));
    layers.insert("vacuum".to_string(), LayerSpec::dielectric(21, "vacuum"));
    let mut config = SimulationConfig::new("cross_section.gds", layers);
    config
        .material_dict
        .insert("silicon", MaterialProperties::new().with("permittivity", 11.45));
    config
}

/// Records the template invocations
#[derive(Default)]
struct RecordingTemplates {
    calls: RefCell<Vec<String>>,
}

impl SifTemplates for RecordingTemplates {
    fn capacitance(
        &self,
        _config: &SimulationConfig,
        _folder: &Path,
        vtu_name: &str,
        angular_frequency: f64,
        dim: u32,
        with_zero: bool,
    ) -> Result<String> {
        self.calls.borrow_mut().push(format!(
            "capacitance {} {} {} {}",
            vtu_name, angular_frequency, dim, with_zero
        ));
        Ok(format!("Post File = \"{}.vtu\"\n", vtu_name))
    }

    fn inductance(
        &self,
        _config: &SimulationConfig,
        _folder: &Path,
        angular_frequency: f64,
        circuit_definitions_file: &str,
    ) -> Result<String> {
        self.calls
            .borrow_mut()
            .push(format!("inductance {} {}", angular_frequency, circuit_definitions_file));
        Ok(String::new())
    }

    fn circuit_definitions(&self, _config: &SimulationConfig) -> Result<String> {
        self.calls.borrow_mut().push("circuit_definitions".to_string());
        Ok("$ Circuits = 1\n".to_string())
    }
}

#[test]
fn test_capacitance_only() {
    let dir = tempfile::tempdir().expect("temp dir");
    let folder = dir.path().join("nested/run");
    let templates = RecordingTemplates::default();

    let files = produce_cross_section_sif_files_with(&templates, &config(), &folder).expect("written");

    assert_eq!(files, vec!["capacitance.sif"]);
    assert_eq!(*templates.calls.borrow(), vec!["capacitance capacitance 0 2 false"]);
    assert!(folder.join("capacitance.sif").is_file());
}

#[test]
fn test_vacuum_capacitance_for_inductance() {
    let dir = tempfile::tempdir().expect("temp dir");
    let templates = RecordingTemplates::default();
    let mut config = config();
    config.run_inductance_sim = true;

    let files = produce_cross_section_sif_files_with(&templates, &config, dir.path()).expect("written");

    assert_eq!(files, vec!["capacitance.sif", "inductance.sif"]);
    assert_eq!(
        *templates.calls.borrow(),
        vec!["capacitance capacitance 0 2 false", "capacitance inductance 0 2 true"]
    );
    assert!(!dir.path().join(CIRCUIT_DEFINITIONS_FILE).exists());
}

#[test]
fn test_london_inductance() {
    let dir = tempfile::tempdir().expect("temp dir");
    let templates = RecordingTemplates::default();
    let mut config = config();
    config.run_inductance_sim = true;
    config.london_penetration_depth = 5e-8;

    let files = produce_cross_section_sif_files_with(&templates, &config, dir.path()).expect("written");

    assert_eq!(files, vec!["capacitance.sif", "inductance.sif"]);
    assert_eq!(
        *templates.calls.borrow(),
        vec![
            "capacitance capacitance 0 2 false",
            "circuit_definitions",
            "inductance 500 inductance.definitions",
        ]
    );
    let definitions = std::fs::read_to_string(dir.path().join(CIRCUIT_DEFINITIONS_FILE)).expect("read");
    assert_eq!(definitions, "$ Circuits = 1\n");
}

#[test]
fn test_files_are_overwritten() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(dir.path().join("capacitance.sif"), "stale").expect("written");

    produce_cross_section_sif_files(&config(), dir.path()).expect("written");

    let content = std::fs::read_to_string(dir.path().join("capacitance.sif")).expect("read");
    assert_ne!(content, "stale");
}

#[test]
fn test_post_file_round_trip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = config();
    config.sif_names = vec!["cs_run".to_string(), "cs_run_l".to_string()];
    config.run_inductance_sim = true;

    let files = produce_cross_section_sif_files(&config, dir.path()).expect("written");
    assert_eq!(files, vec!["cs_run.sif", "cs_run_l.sif"]);

    for (file, name) in files.iter().zip(&config.sif_names) {
        let content = std::fs::read_to_string(dir.path().join(file)).expect("read");
        assert_eq!(declared_post_file(&content).as_deref(), Some(name.as_str()));
    }
}

#[test]
fn test_elmer_capacitance_content() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = config();
    config.run_inductance_sim = true;
    produce_cross_section_sif_files(&config, dir.path()).expect("written");

    let capacitance = std::fs::read_to_string(dir.path().join("capacitance.sif")).expect("read");
    assert!(capacitance.contains("Coordinate System = Cartesian 2D"));
    assert!(capacitance.contains("Coordinate Scaling = 0.000001"));
    assert!(capacitance.contains("Target Bodies(1) = $ substrate"));
    assert!(capacitance.contains("Relative Permittivity = 11.45"));
    assert!(capacitance.contains("Capacitance Matrix Filename = \"capacitance.dat\""));
    assert!(capacitance.contains("Target Boundaries(1) = $ excitation_0_boundary\n  Potential = 0"));
    assert!(capacitance.contains("Target Boundaries(1) = $ excitation_1_boundary\n  Capacitance Body = 1"));
    assert!(!capacitance.contains("$ signal"));

    let vacuum = std::fs::read_to_string(dir.path().join("inductance.sif")).expect("read");
    assert!(vacuum.contains("Capacitance Matrix Filename = \"capacitance0.dat\""));
    assert!(!vacuum.contains("11.45"));
}

#[test]
fn test_floating_conductor_body() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = config();
    config
        .layers
        .insert("island".to_string(), LayerSpec::metal(12, Excitation::Floating));
    produce_cross_section_sif_files(&config, dir.path()).expect("written");

    let capacitance = std::fs::read_to_string(dir.path().join("capacitance.sif")).expect("read");
    assert!(capacitance.contains("Target Boundaries(1) = $ excitation_1_boundary\n  Capacitance Body = 1"));
    assert!(capacitance.contains(
        "Boundary Condition 3\n  Target Boundaries(1) = $ excitation_None_boundary\n  Capacitance Body = 2"
    ));
    assert!(!capacitance.contains("$ island"));
}

#[test]
fn test_elmer_london_content() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = config();
    config.run_inductance_sim = true;
    config.london_penetration_depth = 5e-8;
    produce_cross_section_sif_files(&config, dir.path()).expect("written");

    let inductance = std::fs::read_to_string(dir.path().join("inductance.sif")).expect("read");
    assert!(inductance.starts_with("Include \"inductance.definitions\""));
    assert!(inductance.contains("Angular Frequency = 500"));
    assert!(inductance.contains("London Lambda = 0.00000005"));
    assert!(inductance.contains("Master Bodies(1) = 1"));
    assert!(inductance.contains("Filename = \"inductance.dat\""));
    assert_eq!(declared_post_file(&inductance).as_deref(), Some("inductance"));
}

#[test]
fn test_unknown_units_are_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = config();
    config.units = "furlong".to_string();

    let err = produce_cross_section_sif_files(&config, dir.path()).unwrap_err();
    assert!(err.is_config_error());
}
