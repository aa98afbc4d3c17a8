//! Command implementations behind the `chipsim` binary
//!
//! Each command takes already parsed arguments and returns what the binary
//! prints, so the commands can be exercised without a process.

use chipsim_ansys::{import_cross_section, DesignHandles, LayerObjects, RecordingSession, Token};
use chipsim_core::post_process::{find_varied_parameters, tabulate_into_csv};
use chipsim_core::{CrossSectionImport, Result, SimulationConfig};
use chipsim_elmer::{
    get_cross_section_capacitance_and_inductance, produce_cross_section_mesh, produce_cross_section_sif_files,
    GmshProcess,
};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Write the solver input files of the definition at `config_file`
pub fn write_sif_files(config_file: &Path, folder: &Path) -> Result<Vec<String>> {
    let config = SimulationConfig::load_from_file(config_file)?;
    produce_cross_section_sif_files(&config, folder)
}

/// Mesh the definition at `config_file` into `output` with gmsh
///
/// A relative layout path is taken relative to the definition's directory.
/// `gmsh` overrides the executable found on the search path.
pub fn write_mesh(config_file: &Path, output: &Path, gmsh: Option<&Path>) -> Result<()> {
    let mut config = SimulationConfig::load_from_file(config_file)?;
    if config.gds_file.is_relative() {
        let base = config_file.parent().unwrap_or_else(|| Path::new("."));
        config.gds_file = base.join(&config.gds_file);
    }
    let mut engine = match gmsh {
        Some(program) => GmshProcess::with_program(program),
        None => GmshProcess::new(),
    };
    produce_cross_section_mesh(&mut engine, &config, output)
}

/// Result matrices of a finished run as pretty JSON
pub fn results_json(config_file: &Path, folder: &Path) -> Result<String> {
    let config = SimulationConfig::load_from_file(config_file)?;
    let matrices = get_cross_section_capacitance_and_inductance(&config, folder)?;
    Ok(serde_json::to_string_pretty(&matrices)?)
}

/// Design handles backed by recording sessions
///
/// The editor answers object lookups with one object per layer, named
/// `<layer>_1`, so that the dry run covers the per-object steps.
#[derive(Debug)]
pub struct DryRun {
    pub editor: RecordingSession,
    pub definition_manager: RecordingSession,
    pub boundary_setup: RecordingSession,
    pub analysis_setup: RecordingSession,
    pub mesh_setup: RecordingSession,
    pub fields_reporter: RecordingSession,
}

impl Default for DryRun {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRun {
    pub fn new() -> Self {
        let mut editor = RecordingSession::new("oEditor");
        editor.respond("GetObjectsInGroup", Token::List(Vec::new()));
        editor.respond_with("GetMatchedObjectName", |args| {
            let pattern = args.first().and_then(Token::as_str).unwrap_or_default();
            match pattern.strip_suffix('*') {
                Some(prefix) => Token::List(vec![Token::from(format!("{}1", prefix))]),
                None => Token::List(Vec::new()),
            }
        });
        Self {
            editor,
            definition_manager: RecordingSession::new("oDefinitionManager"),
            boundary_setup: RecordingSession::new("oBoundarySetup"),
            analysis_setup: RecordingSession::new("oAnalysisSetup"),
            mesh_setup: RecordingSession::new("oMeshSetup"),
            fields_reporter: RecordingSession::new("oFieldsReporter"),
        }
    }

    /// Run the cross-section import against the recording sessions
    pub fn import(&mut self, import: &CrossSectionImport, gds_dir: &Path) -> Result<LayerObjects> {
        let mut handles = DesignHandles {
            editor: &mut self.editor,
            definition_manager: &mut self.definition_manager,
            boundary_setup: &mut self.boundary_setup,
            analysis_setup: &mut self.analysis_setup,
            mesh_setup: &mut self.mesh_setup,
            fields_reporter: &mut self.fields_reporter,
        };
        import_cross_section(&mut handles, import, gds_dir)
    }

    /// Script lines of every session, in session order
    pub fn script_lines(&self) -> Vec<String> {
        [
            &self.definition_manager,
            &self.editor,
            &self.boundary_setup,
            &self.fields_reporter,
            &self.mesh_setup,
            &self.analysis_setup,
        ]
        .into_iter()
        .flat_map(RecordingSession::script_lines)
        .collect()
    }
}

/// Script the import of the definition at `config_file` without a solver
///
/// The layout path is taken relative to the definition's directory.
pub fn ansys_script(config_file: &Path) -> Result<Vec<String>> {
    let import = CrossSectionImport::load_from_file(config_file)?;
    let gds_dir = config_file.parent().unwrap_or_else(|| Path::new("."));
    let mut dry_run = DryRun::new();
    dry_run.import(&import, gds_dir)?;
    Ok(dry_run.script_lines())
}

/// Tabulate per-simulation results against the varied sweep parameters
///
/// `data_file` maps definition prefixes to `{layer: value}` objects.
pub fn tabulate(output: &Path, data_file: &Path, definitions: &[PathBuf]) -> Result<()> {
    let content = std::fs::read_to_string(data_file)?;
    let data: IndexMap<String, IndexMap<String, f64>> = serde_json::from_str(&content)?;
    let (parameters, values) = find_varied_parameters(definitions)?;
    tracing::info!("{} varied parameters over {} definitions", parameters.len(), values.len());
    tabulate_into_csv(output, &data, &parameters, &values)
}
