//! Cross-section mesh producer
//!
//! Turns the layers of a 2D cross-section layout into mesher surfaces,
//! fragments them into a conforming partition, tags conductor and outer
//! boundaries as physical groups and writes the generated mesh.

use crate::engine::{DimTag, MeshEngine, SearchBox};
use crate::layout::{read_gds, separated_hull_and_holes, BoundingBox, Layout};
use chipsim_core::constants::BOUNDARY_SEARCH_TOLERANCE;
use chipsim_core::{excitations, match_layer, Error, MeshSizing, Result, SimulationConfig};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::path::Path;

/// Entities keyed by physical group name
pub type NamedDimTags = IndexMap<String, Vec<DimTag>>;

/// Produce the cross-section mesh of `config` into `msh_file`
///
/// An existing mesh file is reused as is.
pub fn produce_cross_section_mesh(
    engine: &mut impl MeshEngine,
    config: &SimulationConfig,
    msh_file: &Path,
) -> Result<()> {
    if msh_file.exists() {
        tracing::info!("Reusing existing mesh from {}", msh_file.display());
        return Ok(());
    }
    let layout = read_gds(&config.gds_file)?;
    build_cross_section_mesh(engine, &layout, config, msh_file)
}

/// Mesh an already loaded layout into `msh_file`
///
/// The engine session is finalized even when a step fails.
pub fn build_cross_section_mesh(
    engine: &mut impl MeshEngine,
    layout: &Layout,
    config: &SimulationConfig,
    msh_file: &Path,
) -> Result<()> {
    engine.initialize()?;
    let built = mesh_layout(engine, layout, config, msh_file);
    let finalized = engine.finalize();
    built.and(finalized)
}

fn mesh_layout(
    engine: &mut impl MeshEngine,
    layout: &Layout,
    config: &SimulationConfig,
    msh_file: &Path,
) -> Result<()> {
    let bbox = layout
        .bbox()
        .ok_or_else(|| Error::Layout("cross-section layout has no shapes".to_string()))?;
    engine.add_model(&config.mesh_name)?;

    let mut layer_tags = NamedDimTags::new();
    for (name, spec) in &config.layers {
        let tags = add_layer_surfaces(engine, layout, spec.layer)?;
        tracing::debug!("Layer {} has {} surfaces", name, tags.len());
        layer_tags.insert(name.clone(), tags);
    }

    let mut new_tags = fragment_layers(engine, &layer_tags)?;
    engine.synchronize()?;

    apply_mesh_sizing(engine, &config.mesh_size, &new_tags, &bbox)?;

    let metal_layers = config.metal_layers();
    for excitation in excitations(&config.layers) {
        let surfaces: Vec<DimTag> = metal_layers
            .iter()
            .filter(|(_, layer)| layer.excitation == Some(excitation))
            .flat_map(|(name, _)| new_tags.get(*name).into_iter().flatten().copied())
            .collect();
        let curves: Vec<DimTag> = recursive_children(engine, &surfaces)?
            .into_iter()
            .filter(|dt| dt.dim == 1)
            .collect();
        new_tags.insert(format!("excitation_{}_boundary", excitation), curves);
    }

    new_tags.extend(outer_boundaries(engine, &bbox)?);

    for (name, tags) in &new_tags {
        let Some(dim) = tags.iter().map(|dt| dt.dim).max() else {
            continue;
        };
        let ids: Vec<i32> = tags.iter().map(|dt| dt.tag).collect();
        engine.add_physical_group(dim, &ids, name)?;
    }

    engine.generate(2)?;
    if let Some(optimizer) = &config.mesh_optimizer {
        engine.optimize(optimizer)?;
    }
    engine.write(msh_file)?;
    tracing::info!("Wrote mesh {}", msh_file.display());

    if config.workflow.run_gmsh_gui {
        engine.run_gui()?;
    }
    Ok(())
}

/// Add the merged polygons of `layer` as surfaces, holes cut out
fn add_layer_surfaces(engine: &mut impl MeshEngine, layout: &Layout, layer: u32) -> Result<Vec<DimTag>> {
    let merged = layout.merged_polygons(layer);
    let mut tags = Vec::new();
    for polygon in merged.iter() {
        let outline = separated_hull_and_holes(polygon);
        if outline.hull.is_empty() {
            continue;
        }
        let hull = DimTag::surface(engine.add_polygon(&outline.hull)?);
        let mut holes = Vec::with_capacity(outline.holes.len());
        for hole in outline.holes.iter().filter(|h| !h.is_empty()) {
            holes.push(DimTag::surface(engine.add_polygon(hole)?));
        }
        if holes.is_empty() {
            tags.push(hull);
        } else {
            tags.extend(engine.cut(&[hull], &holes)?);
        }
    }
    Ok(tags)
}

/// Fragment every layer surface against the others and remap the layers
fn fragment_layers(engine: &mut impl MeshEngine, layer_tags: &NamedDimTags) -> Result<NamedDimTags> {
    let all: Vec<DimTag> = layer_tags.values().flatten().copied().collect();
    if all.is_empty() {
        tracing::warn!("No layer produced any surface");
        return Ok(layer_tags.clone());
    }
    let (_, pieces) = engine.fragment(&all, &[], false)?;
    let fragments: HashMap<DimTag, Vec<DimTag>> = all.iter().copied().zip(pieces).collect();

    Ok(layer_tags
        .iter()
        .map(|(name, tags)| {
            let remapped: Vec<DimTag> = tags
                .iter()
                .flat_map(|dt| fragments.get(dt).into_iter().flatten().copied())
                .collect();
            (name.clone(), remapped)
        })
        .collect())
}

/// All entities below `dim_tags`, down to points
///
/// Each entity is listed once, in the order it is first reached.
pub fn recursive_children(engine: &mut impl MeshEngine, dim_tags: &[DimTag]) -> Result<Vec<DimTag>> {
    let mut children: IndexSet<DimTag> = IndexSet::new();
    let mut current: Vec<DimTag> = dim_tags.to_vec();
    while current.iter().any(|dt| dt.dim > 0) {
        current = engine
            .boundary(&current)?
            .into_iter()
            .filter(|dt| children.insert(*dt))
            .collect();
    }
    Ok(children.into_iter().collect())
}

/// Curves on the four sides of `bbox`
pub fn outer_boundaries(engine: &mut impl MeshEngine, bbox: &BoundingBox) -> Result<NamedDimTags> {
    let e = BOUNDARY_SEARCH_TOLERANCE;
    let sides: [(&str, SearchBox); 4] = [
        ("xmin_boundary", [bbox.x_min - e, bbox.y_min - e, -e, bbox.x_min + e, bbox.y_max + e, e]),
        ("xmax_boundary", [bbox.x_max - e, bbox.y_min - e, -e, bbox.x_max + e, bbox.y_max + e, e]),
        ("ymin_boundary", [bbox.x_min - e, bbox.y_min - e, -e, bbox.x_max + e, bbox.y_min + e, e]),
        ("ymax_boundary", [bbox.x_min - e, bbox.y_max - e, -e, bbox.x_max + e, bbox.y_max + e, e]),
    ];
    let mut boundaries = NamedDimTags::new();
    for (name, search) in sides {
        boundaries.insert(name.to_string(), engine.entities_in_bounding_box(search, 1)?);
    }
    Ok(boundaries)
}

fn as_field_values(tags: impl IntoIterator<Item = i32>) -> Vec<f64> {
    tags.into_iter().map(f64::from).collect()
}

/// Apply the mesh-size settings to the fragmented layers
///
/// Every pattern gets a constant size inside its surfaces. A pattern with an
/// expansion rate also grows the size linearly with the distance from the
/// surfaces' boundary curves, starting after its boundary distance. All
/// fields are combined with a minimum into the background field.
pub fn apply_mesh_sizing(
    engine: &mut impl MeshEngine,
    sizing: &MeshSizing,
    layer_tags: &NamedDimTags,
    bbox: &BoundingBox,
) -> Result<()> {
    if let Some(threads) = sizing.n_threads {
        engine.set_option_number("General.NumThreads", f64::from(threads))?;
    }
    if let Some(global_max) = sizing.global_max {
        engine.set_option_number("Mesh.MeshSizeMax", global_max)?;
    }

    let mut fields = Vec::new();
    for (pattern, size) in &sizing.layers {
        let Some(element_size) = size.size() else {
            tracing::warn!("Mesh size of '{}' is empty", pattern);
            continue;
        };
        let surfaces: Vec<DimTag> = layer_tags
            .iter()
            .filter(|(name, _)| match_layer(name, pattern))
            .flat_map(|(_, tags)| tags.iter().copied())
            .filter(|dt| dt.dim == 2)
            .collect();
        if surfaces.is_empty() {
            tracing::debug!("Mesh size pattern '{}' matches no surface", pattern);
            continue;
        }

        let constant = engine.add_field("Constant")?;
        engine.set_field_number(constant, "VIn", element_size)?;
        engine.set_field_numbers(constant, "SurfacesList", &as_field_values(surfaces.iter().map(|dt| dt.tag)))?;
        engine.set_field_number(constant, "IncludeBoundary", 1.0)?;
        fields.push(constant);

        let Some(rate) = size.expansion_rate().filter(|rate| *rate > 0.0) else {
            continue;
        };
        let curves: Vec<i32> = recursive_children(engine, &surfaces)?
            .into_iter()
            .filter(|dt| dt.dim == 1)
            .map(|dt| dt.tag)
            .collect();
        let distance = engine.add_field("Distance")?;
        engine.set_field_numbers(distance, "CurvesList", &as_field_values(curves))?;

        let dist_min = size.boundary_distance().unwrap_or(0.0);
        let size_max = sizing
            .global_max
            .unwrap_or(element_size + rate * bbox.width().hypot(bbox.height()))
            .max(element_size);
        let threshold = engine.add_field("Threshold")?;
        engine.set_field_number(threshold, "InField", f64::from(distance))?;
        engine.set_field_number(threshold, "SizeMin", element_size)?;
        engine.set_field_number(threshold, "SizeMax", size_max)?;
        engine.set_field_number(threshold, "DistMin", dist_min)?;
        engine.set_field_number(threshold, "DistMax", dist_min + (size_max - element_size) / rate)?;
        fields.push(threshold);
    }

    if fields.is_empty() {
        return Ok(());
    }
    let minimum = engine.add_field("Min")?;
    engine.set_field_numbers(minimum, "FieldsList", &as_field_values(fields))?;
    engine.set_background_field(minimum)?;
    for option in [
        "Mesh.MeshSizeExtendFromBoundary",
        "Mesh.MeshSizeFromPoints",
        "Mesh.MeshSizeFromCurvature",
    ] {
        engine.set_option_number(option, 0.0)?;
    }
    Ok(())
}
