//! Cross-section geometry import
//!
//! Drives a fresh 2D extractor design from a [`CrossSectionImport`]
//! definition: materials, layout import, per-layer material and color,
//! conductor excitations, optional energy integrals, mesh operations and the
//! matrix solution setup.

use crate::geometry::{add_layer, add_material, color_by_material, scale, set_color, set_material, LayerMap, DEFAULT_LAYER_TYPE};
use crate::session::{call, ScriptObject};
use crate::token::Token;
use crate::tokens;
use chipsim_core::{excitations, match_layer, AnalysisSetup, CrossSectionImport, Excitation, Result};
use indexmap::IndexMap;
use std::path::Path;

/// Handles of the active design
pub struct DesignHandles<'a> {
    /// 3D modeler editor
    pub editor: &'a mut dyn ScriptObject,
    /// Project definition manager
    pub definition_manager: &'a mut dyn ScriptObject,
    /// `BoundarySetup` module
    pub boundary_setup: &'a mut dyn ScriptObject,
    /// `AnalysisSetup` module
    pub analysis_setup: &'a mut dyn ScriptObject,
    /// `MeshSetup` module
    pub mesh_setup: &'a mut dyn ScriptObject,
    /// `FieldsReporter` module
    pub fields_reporter: &'a mut dyn ScriptObject,
}

/// Model objects created per layer
pub type LayerObjects = IndexMap<String, Vec<String>>;

/// Name of the imported layout structure
const IMPORT_STRUCT: &str = "SIM1";

fn boundary_assignment(excitation: Excitation) -> (&'static str, String) {
    match excitation {
        Excitation::Ground => ("AssignSingleReferenceGround", "ground".to_string()),
        Excitation::Floating => ("AssignSingleFloatingLine", "floating".to_string()),
        Excitation::Signal(n) => ("AssignSingleSignalLine", format!("signal_{}", n)),
    }
}

/// Object names belonging to `layer`: `<layer>_<digits>`
fn layer_object(layer: &str, object: &str) -> bool {
    object
        .strip_prefix(layer)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
}

fn import_layout(editor: &mut dyn ScriptObject, import: &CrossSectionImport, gds_dir: &Path) -> Result<()> {
    let mut layer_map = LayerMap::new();
    for (order, (name, layer)) in import.layers.iter().enumerate() {
        add_layer(&mut layer_map, layer.layer, name, order, DEFAULT_LAYER_TYPE);
    }

    let file_name = gds_dir.join(&import.gds_file);
    call(
        editor,
        "ImportGDSII",
        vec![Token::List(tokens![
            "NAME:options",
            "FileName:=",
            file_name.to_string_lossy().into_owned(),
            "FlattenHierarchy:=",
            true,
            "ImportMethod:=",
            1,
            layer_map.layer_map(),
            "OrderMap:=",
            layer_map.order_map(),
            tokens![
                "NAME:Structs",
                tokens![
                    "NAME:GDSIIStruct",
                    "ImportStruct:=",
                    true,
                    "CreateNewCell:=",
                    true,
                    "StructName:=",
                    IMPORT_STRUCT,
                ],
            ],
        ])],
    )?;

    let sheets = editor
        .invoke("GetObjectsInGroup", tokens!["Sheets"])?
        .into_strings();
    scale(editor, &sheets, import.gds_scaling)
}

fn assign_excitations(
    boundary_setup: &mut dyn ScriptObject,
    import: &CrossSectionImport,
    objects: &LayerObjects,
) -> Result<()> {
    let metal_layers = import.metal_layers();
    for excitation in excitations(&import.layers) {
        let objs: Vec<String> = metal_layers
            .iter()
            .filter(|(_, layer)| layer.excitation == Some(excitation))
            .flat_map(|(name, _)| objects.get(*name).into_iter().flatten().cloned())
            .collect();
        if objs.is_empty() {
            continue;
        }
        let (method, name) = boundary_assignment(excitation);
        tracing::info!("Assigning {} to {} objects", name, objs.len());
        call(
            boundary_setup,
            method,
            vec![Token::List(tokens![
                format!("NAME:{}", name),
                "Objects:=",
                objs,
                "SolveOption:=",
                "Automatic",
                "Thickness:=",
                "-1000mm",
            ])],
        )?;
    }
    Ok(())
}

fn add_energy_integrals(
    fields_reporter: &mut dyn ScriptObject,
    import: &CrossSectionImport,
    objects: &LayerObjects,
) -> Result<()> {
    let metal_layers = import.metal_layers();
    for (name, objs) in objects {
        if metal_layers.contains_key(name.as_str()) {
            continue;
        }
        for (i, obj) in objs.iter().enumerate() {
            call(fields_reporter, "CopyNamedExprToStack", tokens!["energyCG"])?;
            call(fields_reporter, "EnterVol", tokens![obj])?;
            call(fields_reporter, "CalcOp", tokens!["Integrate"])?;
            if i > 0 {
                call(fields_reporter, "CalcOp", tokens!["+"])?;
            }
        }
        if objs.is_empty() {
            call(fields_reporter, "EnterScalar", tokens![0.0])?;
        }
        call(
            fields_reporter,
            "AddNamedExpression",
            tokens![format!("E_{}", name), "CG Fields"],
        )?;
    }
    Ok(())
}

fn assign_mesh_lengths(
    mesh_setup: &mut dyn ScriptObject,
    import: &CrossSectionImport,
    objects: &LayerObjects,
) -> Result<()> {
    for (pattern, size) in &import.mesh_size.layers {
        let Some(length) = size.size() else {
            tracing::warn!("Mesh size of '{}' has no maximum length", pattern);
            continue;
        };
        let mesh_objects: Vec<String> = import
            .layers
            .keys()
            .filter(|name| match_layer(name, pattern))
            .flat_map(|name| objects.get(name).into_iter().flatten().cloned())
            .collect();
        if mesh_objects.is_empty() {
            continue;
        }
        call(
            mesh_setup,
            "AssignLengthOp",
            vec![Token::List(tokens![
                format!("NAME:mesh_size_{}", pattern),
                "RefineInside:=",
                true,
                "Enabled:=",
                true,
                "Objects:=",
                mesh_objects,
                "RestrictElem:=",
                false,
                "RestrictLength:=",
                true,
                "MaxLength:=",
                format!("{}{}", length, import.units),
            ])],
        )?;
    }
    Ok(())
}

fn data_block(setup: &AnalysisSetup, data_type: &str) -> Token {
    let name = format!("NAME:{}DataBlock", data_type);
    Token::List(tokens![
        name,
        "MaxPass:=",
        setup.maximum_passes,
        "MinPass:=",
        setup.minimum_passes,
        "MinConvPass:=",
        setup.minimum_converged_passes,
        "PerError:=",
        setup.percent_error,
        "PerRefine:=",
        setup.percent_refinement,
        "DataType:=",
        data_type,
        "Included:=",
        true,
        "UseParamConv:=",
        false,
        "UseLossyParamConv:=",
        false,
        "PerErrorParamConv:=",
        1,
        "UseLossConv:=",
        false,
    ])
}

fn insert_setup(analysis_setup: &mut dyn ScriptObject, setup: &AnalysisSetup) -> Result<()> {
    call(
        analysis_setup,
        "InsertSetup",
        vec![
            Token::from("2DMatrix"),
            Token::List(tokens![
                "NAME:Setup1",
                "AdaptiveFreq:=",
                format!("{}{}", setup.frequency, setup.frequency_units),
                "SaveFields:=",
                true,
                "Enabled:=",
                true,
                tokens!["NAME:MeshLink", "ImportMesh:=", false],
                data_block(setup, "CG"),
                data_block(setup, "RL"),
            ]),
        ],
    )
}

/// Build the cross-section design described by `import`
///
/// `gds_dir` is the directory the layout file name is relative to. Returns
/// the model objects found on each layer after the import.
pub fn import_cross_section(
    handles: &mut DesignHandles<'_>,
    import: &CrossSectionImport,
    gds_dir: &Path,
) -> Result<LayerObjects> {
    tracing::info!("Importing cross section from {}", import.gds_file.display());

    call(
        handles.editor,
        "SetModelUnits",
        vec![Token::List(tokens![
            "NAME:Units Parameter",
            "Units:=",
            import.units.as_str(),
            "Rescale:=",
            false,
        ])],
    )?;

    for (name, properties) in import.material_dict.iter() {
        add_material(handles.definition_manager, name, properties)?;
    }

    import_layout(handles.editor, import, gds_dir)?;

    let mut objects = LayerObjects::new();
    for (name, layer) in &import.layers {
        let matched: Vec<String> = handles
            .editor
            .invoke("GetMatchedObjectName", tokens![format!("{}_*", name)])?
            .into_strings()
            .into_iter()
            .filter(|object| layer_object(name, object))
            .collect();
        tracing::debug!("Layer {} has {} objects", name, matched.len());

        let material = layer.material.as_deref();
        set_material(handles.editor, &matched, material, None)?;
        let color = color_by_material(material.unwrap_or_default(), &import.material_dict, true);
        set_color(handles.editor, &matched, &color)?;
        objects.insert(name.clone(), matched);
    }

    assign_excitations(handles.boundary_setup, import, &objects)?;

    if import.integrate_energies {
        add_energy_integrals(handles.fields_reporter, import, &objects)?;
    }

    assign_mesh_lengths(handles.mesh_setup, import, &objects)?;
    insert_setup(handles.analysis_setup, &import.analysis_setup)?;
    call(handles.editor, "FitAll", Vec::new())?;

    tracing::info!("Import completed");
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_object_suffix() {
        assert!(layer_object("signal", "signal_1"));
        assert!(layer_object("signal", "signal_12"));
        assert!(!layer_object("signal", "signal_"));
        assert!(!layer_object("signal", "signal_a1"));
        assert!(!layer_object("signal", "signal_top_1"));
        assert!(!layer_object("signal", "ground_1"));
    }

    #[test]
    fn test_boundary_assignment_names() {
        assert_eq!(
            boundary_assignment(Excitation::Ground),
            ("AssignSingleReferenceGround", "ground".to_string())
        );
        assert_eq!(
            boundary_assignment(Excitation::Floating),
            ("AssignSingleFloatingLine", "floating".to_string())
        );
        assert_eq!(
            boundary_assignment(Excitation::Signal(2)),
            ("AssignSingleSignalLine", "signal_2".to_string())
        );
    }
}
