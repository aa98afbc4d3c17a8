//! Elmer solver input files
//!
//! A cross-section run needs one capacitance model and, when inductance is
//! requested, a second model: either the vacuum capacitance (inductance
//! follows from it) or a London-equation magnetodynamics model driven by a
//! circuit.

use chipsim_core::constants::{INDUCTANCE_ANGULAR_FREQUENCY, VACUUM_PERMEABILITY, VACUUM_PERMITTIVITY};
use chipsim_core::{ConfigError, Error, Excitation, Result, SimulationConfig};
use std::path::Path;

/// Name of the circuit definition file of the London model
pub const CIRCUIT_DEFINITIONS_FILE: &str = "inductance.definitions";

/// Generators of the solver input text
pub trait SifTemplates {
    /// Electrostatic capacitance model
    ///
    /// `with_zero` models the vacuum capacitance: every relative permittivity
    /// is 1 and the matrix goes to `capacitance0.dat`.
    fn capacitance(
        &self,
        config: &SimulationConfig,
        folder: &Path,
        vtu_name: &str,
        angular_frequency: f64,
        dim: u32,
        with_zero: bool,
    ) -> Result<String>;

    /// London-equation inductance model
    fn inductance(
        &self,
        config: &SimulationConfig,
        folder: &Path,
        angular_frequency: f64,
        circuit_definitions_file: &str,
    ) -> Result<String>;

    /// Circuit definitions included by the inductance model
    fn circuit_definitions(&self, config: &SimulationConfig) -> Result<String>;
}

/// Bundled templates for Elmer
#[derive(Debug, Clone, Copy, Default)]
pub struct ElmerTemplates;

/// Metres per model unit
pub fn unit_scale(units: &str) -> Option<f64> {
    match units {
        "m" => Some(1.0),
        "mm" => Some(1e-3),
        "um" | "µm" => Some(1e-6),
        "nm" => Some(1e-9),
        _ => None,
    }
}

fn coordinate_scaling(config: &SimulationConfig) -> Result<f64> {
    unit_scale(&config.units).ok_or_else(|| {
        ConfigError::InvalidValue {
            key: "units".to_string(),
            reason: format!("unknown length unit '{}'", config.units),
        }
        .into()
    })
}

/// One `Name ... End` block of a solver input file
struct Section {
    title: String,
    lines: Vec<String>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    fn set(self, key: &str, value: impl std::fmt::Display) -> Self {
        self.line(format!("{} = {}", key, value))
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("{}\n", self.title));
        for line in &self.lines {
            out.push_str(&format!("  {}\n", line));
        }
        out.push_str("End\n\n");
    }
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", text)
}

fn header(config: &SimulationConfig, folder: &Path) -> Section {
    Section::new("Header")
        .line("CHECK KEYWORDS Warn")
        .line(format!("Mesh DB \".\" {}", quoted(&config.mesh_name)))
        .line(format!("Include Path {}", quoted(&folder.to_string_lossy())))
}

fn simulation(scaling: f64, dim: u32, angular_frequency: f64, post_file: &str) -> Section {
    let mut section = Section::new("Simulation")
        .set("Max Output Level", 3)
        .set("Coordinate System", format!("Cartesian {}D", dim))
        .set("Coordinate Scaling", scaling)
        .set("Simulation Type", "Steady State")
        .set("Steady State Max Iterations", 1);
    if angular_frequency > 0.0 {
        section = section.set("Angular Frequency", angular_frequency);
    }
    section.set("Post File", quoted(post_file))
}

fn linear_system(section: Section, config: &SimulationConfig) -> Section {
    section
        .set("Linear System Solver", "Iterative")
        .set("Linear System Iterative Method", &config.solver.linear_system_method)
        .set("Linear System Max Iterations", config.solver.max_iterations)
        .set("Linear System Convergence Tolerance", config.solver.convergence_tolerance)
        .set("Linear System Preconditioning", "ILU0")
        .set("Element", quoted(&format!("p:{}", config.solver.p_element_order)))
}

fn excitation_boundary(excitation: Excitation) -> String {
    format!("$ excitation_{}_boundary", excitation)
}

/// Capacitance body numbers: signals first, then floating conductors
fn capacitance_bodies(config: &SimulationConfig) -> Vec<(Excitation, Option<u32>)> {
    let excitations = chipsim_core::excitations(&config.layers);
    let signals = excitations
        .iter()
        .filter(|e| matches!(e, Excitation::Signal(_)))
        .count();
    let mut next_floating = u32::try_from(signals).unwrap_or(u32::MAX);
    excitations
        .into_iter()
        .map(|excitation| match excitation {
            Excitation::Ground => (excitation, None),
            Excitation::Signal(n) => (excitation, Some(n)),
            Excitation::Floating => {
                next_floating = next_floating.saturating_add(1);
                (excitation, Some(next_floating))
            }
        })
        .collect()
}

impl SifTemplates for ElmerTemplates {
    fn capacitance(
        &self,
        config: &SimulationConfig,
        folder: &Path,
        vtu_name: &str,
        angular_frequency: f64,
        dim: u32,
        with_zero: bool,
    ) -> Result<String> {
        let scaling = coordinate_scaling(config)?;
        let matrix_file = if with_zero { "capacitance0.dat" } else { "capacitance.dat" };
        let mut sections = vec![
            header(config, folder),
            simulation(scaling, dim, angular_frequency, &format!("{}.vtu", vtu_name)),
            Section::new("Constants").set("Permittivity Of Vacuum", VACUUM_PERMITTIVITY),
        ];

        let dielectrics: Vec<(&String, f64)> = config
            .layers
            .iter()
            .filter(|(_, layer)| !layer.is_metal())
            .map(|(name, layer)| {
                let permittivity = match (&layer.material, with_zero) {
                    (Some(material), false) => config.material_dict.permittivity(material),
                    _ => 1.0,
                };
                (name, permittivity)
            })
            .collect();
        for (i, (name, permittivity)) in dielectrics.iter().enumerate() {
            let n = i + 1;
            sections.push(
                Section::new(format!("Body {}", n))
                    .set("Target Bodies(1)", format!("$ {}", name))
                    .set("Equation", 1)
                    .set("Material", n),
            );
            sections.push(
                Section::new(format!("Material {}", n)).set("Relative Permittivity", permittivity),
            );
        }

        sections.push(Section::new("Equation 1").set("Active Solvers(1)", 1));
        sections.push(linear_system(
            Section::new("Solver 1")
                .set("Equation", "Electrostatics")
                .set("Procedure", "\"StatElecSolve\" \"StatElecSolver\"")
                .set("Variable", "Potential")
                .set("Calculate Electric Energy", "True")
                .set("Calculate Capacitance Matrix", "True")
                .set("Capacitance Matrix Filename", quoted(matrix_file)),
            config,
        ));

        for (i, (excitation, body)) in capacitance_bodies(config).into_iter().enumerate() {
            let section = Section::new(format!("Boundary Condition {}", i + 1))
                .set("Target Boundaries(1)", excitation_boundary(excitation));
            sections.push(match body {
                None => section.set("Potential", 0.0),
                Some(body) => section.set("Capacitance Body", body),
            });
        }

        let mut out = String::new();
        for section in &sections {
            section.render(&mut out);
        }
        Ok(out)
    }

    fn inductance(
        &self,
        config: &SimulationConfig,
        folder: &Path,
        angular_frequency: f64,
        circuit_definitions_file: &str,
    ) -> Result<String> {
        let scaling = coordinate_scaling(config)?;
        let vtu_name = config
            .sif_names
            .get(1)
            .map(String::as_str)
            .unwrap_or("inductance");
        let mut out = String::new();
        out.push_str(&format!("Include {}\n\n", quoted(circuit_definitions_file)));

        let mut sections = vec![
            header(config, folder),
            simulation(scaling, 2, angular_frequency, &format!("{}.vtu", vtu_name)),
            Section::new("Constants").set("Permeability Of Vacuum", VACUUM_PERMEABILITY),
        ];

        for (i, (name, layer)) in config.layers.iter().enumerate() {
            let n = i + 1;
            let mut body = Section::new(format!("Body {}", n))
                .set("Target Bodies(1)", format!("$ {}", name))
                .set("Equation", 1)
                .set("Material", n);
            let mut material = Section::new(format!("Material {}", n)).set("Relative Permeability", 1.0);
            if layer.excitation == Some(Excitation::Signal(1)) {
                body = body.set("Body Force", 1);
            }
            if layer.is_metal() {
                material = material
                    .set("London Lambda", config.london_penetration_depth)
                    .set("Electric Conductivity", 0.0);
            }
            sections.push(body);
            sections.push(material);
        }

        let signal_bodies: Vec<String> = config
            .layers
            .iter()
            .enumerate()
            .filter(|(_, (_, layer))| layer.excitation == Some(Excitation::Signal(1)))
            .map(|(i, _)| (i + 1).to_string())
            .collect();
        sections.push(
            Section::new("Component 1")
                .set("Name", quoted("signal"))
                .set(&format!("Master Bodies({})", signal_bodies.len()), signal_bodies.join(" "))
                .set("Coil Type", quoted("Massive"))
                .set("London Equations", "Logical True"),
        );
        sections.push(
            Section::new("Body Force 1")
                .set("Name", quoted("Circuit"))
                .set("Circuit Current Source 1", "Real 1.0"),
        );
        sections.push(Section::new("Equation 1").set("Active Solvers(2)", "1 2"));
        sections.push(linear_system(
            Section::new("Solver 1")
                .set("Equation", quoted("Mag"))
                .set("Procedure", "\"MagnetoDynamics2D\" \"MagnetoDynamics2DHarmonic\"")
                .set("Variable", "A[A re:1 A im:1]")
                .set("Export Lagrange Multiplier", "Logical True"),
            config,
        ));
        sections.push(
            Section::new("Solver 2")
                .set("Exec Solver", "Always")
                .set("Equation", quoted("Circuits"))
                .set("Variable", "X")
                .set("No Matrix", "Logical True")
                .set("Procedure", "\"CircuitsAndDynamics\" \"CircuitsAndDynamicsHarmonic\""),
        );
        sections.push(
            Section::new("Solver 3")
                .set("Exec Solver", "After Timestep")
                .set("Equation", quoted("SaveData"))
                .set("Procedure", "\"SaveData\" \"SaveScalars\"")
                .set("Filename", quoted("inductance.dat"))
                .set("Save Component Results", "Logical True"),
        );
        for (i, name) in ["xmin_boundary", "xmax_boundary", "ymin_boundary", "ymax_boundary"]
            .iter()
            .enumerate()
        {
            sections.push(
                Section::new(format!("Boundary Condition {}", i + 1))
                    .set("Target Boundaries(1)", format!("$ {}", name))
                    .set("A re", 0.0)
                    .set("A im", 0.0),
            );
        }

        for section in &sections {
            section.render(&mut out);
        }
        Ok(out)
    }

    fn circuit_definitions(&self, _config: &SimulationConfig) -> Result<String> {
        let mut out = String::new();
        let lines = [
            "$ Circuits = 1",
            "",
            "! Current-driven signal conductor",
            "$ C.1.perm = zeros(2)",
            "$ C.1.perm(0) = 0",
            "$ C.1.perm(1) = 1",
            "",
            "$ C.1.variables = 2",
            "$ C.1.A = zeros(2,2)",
            "$ C.1.B = zeros(2,2)",
            "$ C.1.Mre = zeros(2,2)",
            "$ C.1.Mim = zeros(2,2)",
            "",
            "$ C.1.name.1 = \"i_component(1)\"",
            "$ C.1.name.2 = \"v_component(1)\"",
            "",
            "$ C.1.source.1 = \"Circuit Current Source 1\"",
            "",
            "$ C.1.B(0,0) = 1",
        ];
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Declared post-processing output name of a solver input file
///
/// Reads the `Post File` entry and returns it without the `.vtu` extension.
pub fn declared_post_file(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("Post File") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        Some(value.strip_suffix(".vtu").unwrap_or(value).to_string())
    })
}

fn save(folder: &Path, file_name: &str, content: &str) -> Result<String> {
    std::fs::write(folder.join(file_name), content)?;
    tracing::debug!("Wrote {}", folder.join(file_name).display());
    Ok(file_name.to_string())
}

fn sif_name(config: &SimulationConfig, index: usize) -> Result<&str> {
    config
        .sif_names
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| Error::from(ConfigError::MissingKey(format!("sif_names[{}]", index))))
}

/// Write the solver input files of `config` into `folder`
///
/// Returns the written file names, relative to `folder`.
pub fn produce_cross_section_sif_files(config: &SimulationConfig, folder: &Path) -> Result<Vec<String>> {
    produce_cross_section_sif_files_with(&ElmerTemplates, config, folder)
}

/// [`produce_cross_section_sif_files`] with custom templates
pub fn produce_cross_section_sif_files_with(
    templates: &impl SifTemplates,
    config: &SimulationConfig,
    folder: &Path,
) -> Result<Vec<String>> {
    std::fs::create_dir_all(folder)?;

    let capacitance_name = sif_name(config, 0)?;
    let mut sif_files = vec![save(
        folder,
        &format!("{}.sif", capacitance_name),
        &templates.capacitance(config, folder, capacitance_name, 0.0, 2, false)?,
    )?];

    if config.run_inductance_sim {
        let inductance_name = sif_name(config, 1)?;
        let content = if config.use_london_equations() {
            let definitions = save(
                folder,
                CIRCUIT_DEFINITIONS_FILE,
                &templates.circuit_definitions(config)?,
            )?;
            templates.inductance(config, folder, INDUCTANCE_ANGULAR_FREQUENCY, &definitions)?
        } else {
            templates.capacitance(config, folder, inductance_name, 0.0, 2, true)?
        };
        sif_files.push(save(folder, &format!("{}.sif", inductance_name), &content)?);
    }

    tracing::info!("Wrote {} solver input files to {}", sif_files.len(), folder.display());
    Ok(sif_files)
}
