use chipsim::commands::{ansys_script, results_json, tabulate, write_mesh, write_sif_files, DryRun};
use chipsim::{CrossSectionImport, Error};
use serde_json::json;
use std::path::{Path, PathBuf};

fn write_json(path: &Path, value: serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(&value).expect("serialized")).expect("written");
}

fn simulation_definition(dir: &Path) -> PathBuf {
    let path = dir.join("simulation.json");
    write_json(
        &path,
        json!({
            "gds_file": "cross_section.gds",
            "layers": {
                "signal": {"layer": 10, "excitation": 1},
                "ground": {"layer": 11, "excitation": 0},
                "substrate": {"layer": 20, "material": "si"},
                "vacuum": {"layer": 21, "material": "vacuum"}
            },
            "material_dict": {"si": {"permittivity": 11.45}},
            "run_inductance_sim": true
        }),
    );
    path
}

fn import_definition(dir: &Path) -> PathBuf {
    let path = dir.join("import.json");
    write_json(
        &path,
        json!({
            "gds_file": "layout.gds",
            "layers": {
                "signal": {"layer": 10, "excitation": 1, "material": "pec"},
                "substrate": {"layer": 20, "material": "si"}
            },
            "material_dict": {"si": {"permittivity": 11.45}}
        }),
    );
    path
}

#[test]
fn test_sif_command() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = simulation_definition(dir.path());
    let folder = dir.path().join("run");

    let files = write_sif_files(&config, &folder).expect("written");
    assert_eq!(files, vec!["capacitance.sif", "inductance.sif"]);
    assert!(folder.join("inductance.sif").is_file());
}

#[test]
fn test_results_command() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = simulation_definition(dir.path());
    std::fs::write(dir.path().join("capacitance.dat"), "2.0\n").expect("written");

    let output = results_json(&config, dir.path()).expect("read");
    let value: serde_json::Value = serde_json::from_str(&output).expect("json");
    assert_eq!(value, json!({"Cs": [[2.0]], "Ls": null}));
}

#[test]
fn test_results_command_rejects_invalid_definition() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("simulation.json");
    write_json(&path, json!({"gds_file": "cs.gds", "layers": {}, "sif_names": []}));

    assert!(results_json(&path, dir.path()).is_err());
}

#[test]
fn test_ansys_script_command() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = import_definition(dir.path());

    let lines = ansys_script(&config).expect("scripted");
    assert!(lines[0].starts_with("oDefinitionManager.AddMaterial("));
    assert!(lines.iter().any(|l| l.starts_with("oEditor.SetModelUnits(")));
    let import = lines
        .iter()
        .find(|l| l.starts_with("oEditor.ImportGDSII("))
        .expect("import line");
    assert!(import.contains("layout.gds"));
    assert!(lines.iter().any(|l| l.starts_with("oBoundarySetup.AssignSingleSignalLine(")));
    assert!(lines.iter().any(|l| l.starts_with("oAnalysisSetup.InsertSetup(")));
}

#[test]
fn test_dry_run_objects() {
    let dir = tempfile::tempdir().expect("temp dir");
    let import = CrossSectionImport::load_from_file(&import_definition(dir.path())).expect("loaded");

    let mut dry_run = DryRun::new();
    let objects = dry_run.import(&import, dir.path()).expect("imported");

    assert_eq!(objects["signal"], vec!["signal_1"]);
    assert_eq!(objects["substrate"], vec!["substrate_1"]);
    assert_eq!(dry_run.editor.calls_to("GetMatchedObjectName").len(), 2);
    assert!(dry_run.fields_reporter.calls().is_empty());
}

#[test]
fn test_tabulate_command() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut definitions = Vec::new();
    for (name, width) in [("sweep_0", 10.0), ("sweep_1", 20.0)] {
        let path = dir.path().join(format!("{}.json", name));
        write_json(&path, json!({"parameters": {"width": width, "gap": 6.0}}));
        definitions.push(path);
    }
    let key = |path: &PathBuf| path.to_string_lossy().replace(".json", "");

    let data = dir.path().join("results.json");
    write_json(
        &data,
        json!({ key(&definitions[0]): {"signal": 1.5}, key(&definitions[1]): {"signal": 2.5, "ground": 0.5} }),
    );
    let output = dir.path().join("table.csv");

    tabulate(&output, &data, &definitions).expect("tabulated");

    let csv = std::fs::read_to_string(&output).expect("read");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "key,width,ground,signal");
    assert_eq!(lines[1], format!("{},10.0,0,1.5", key(&definitions[0])));
    assert_eq!(lines[2], format!("{},20.0,0.5,2.5", key(&definitions[1])));
}

#[test]
fn test_mesh_command_reuses_existing_mesh() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = simulation_definition(dir.path());
    let output = dir.path().join("cross_section.msh");
    std::fs::write(&output, "$MeshFormat\n").expect("written");

    // Neither the layout nor the executable exist
    write_mesh(&config, &output, Some(&dir.path().join("no-gmsh"))).expect("reused");
    assert_eq!(std::fs::read_to_string(&output).expect("read"), "$MeshFormat\n");
}

#[test]
fn test_mesh_command_reads_layout_next_to_definition() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = simulation_definition(dir.path());

    let err = write_mesh(&config, &dir.path().join("out.msh"), None).unwrap_err();
    assert!(matches!(err, Error::Layout(_)));
    assert!(err.to_string().contains(&dir.path().join("cross_section.gds").display().to_string()));
}
