//! Mesh engine driving the gmsh executable
//!
//! Boolean operations run in-process on `geo` polygons. [`MeshEngine::synchronize`]
//! turns the surfaces into a conforming point, curve and surface topology so
//! that topology queries answer with the tags the generated `.geo` script
//! declares. Physical groups, options, size fields and meshing steps are
//! recorded, and [`MeshEngine::write`] runs `gmsh <script> -` to produce the
//! mesh file.

use crate::engine::{DimTag, MeshEngine, SearchBox};
use chipsim_core::{Error, MeshOptimizer, Result};
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Points closer than this (µm) are merged
const POINT_TOLERANCE: f64 = 1e-7;

/// Boolean fragments smaller than this (µm²) are dropped
const AREA_TOLERANCE: f64 = 1e-12;

/// Lines of gmsh output kept in error messages
const LOG_TAIL: usize = 15;

fn tag_of(index: usize) -> i32 {
    i32::try_from(index + 1).unwrap_or(i32::MAX)
}

fn index_of(tag: i32) -> Option<usize> {
    usize::try_from(tag).ok()?.checked_sub(1)
}

fn unknown(dim_tag: &DimTag) -> Error {
    Error::Mesh(format!("unknown entity {}", dim_tag))
}

/// Polygons of `shapes` above the area tolerance
fn significant(shapes: MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    shapes
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > AREA_TOLERANCE)
        .collect()
}

/// Conforming topology of the synchronized surfaces
///
/// Point and curve tags are their index plus one. Surface loops hold signed
/// curve tags, the exterior first.
#[derive(Debug, Clone, Default)]
struct Topology {
    points: Vec<Coord<f64>>,
    point_ids: HashMap<(i64, i64), usize>,
    curves: Vec<(usize, usize)>,
    curve_ids: HashMap<(usize, usize), i32>,
    surfaces: IndexMap<i32, Vec<Vec<i32>>>,
}

impl Topology {
    fn build(surfaces: &IndexMap<i32, Polygon<f64>>) -> Self {
        let mut topology = Self::default();
        let rings: Vec<(i32, Vec<Vec<usize>>)> = surfaces
            .iter()
            .map(|(&tag, polygon)| {
                let loops = std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(|ring| topology.ring_points(ring))
                    .filter(|ids| ids.len() >= 3)
                    .collect();
                (tag, loops)
            })
            .collect();

        // Every vertex is known now, so shared edges can be split at the
        // vertices of neighbouring surfaces that lie on them.
        for (tag, loops) in rings {
            let curve_loops: Vec<Vec<i32>> = loops
                .iter()
                .map(|ids| {
                    let split = topology.split_at_vertices(ids);
                    (0..split.len())
                        .map(|k| topology.curve(split[k], split[(k + 1) % split.len()]))
                        .collect()
                })
                .collect();
            topology.surfaces.insert(tag, curve_loops);
        }
        topology
    }

    fn point(&mut self, c: Coord<f64>) -> usize {
        let key = (
            (c.x / POINT_TOLERANCE).round() as i64,
            (c.y / POINT_TOLERANCE).round() as i64,
        );
        *self.point_ids.entry(key).or_insert_with(|| {
            self.points.push(c);
            self.points.len() - 1
        })
    }

    /// Point indices of an open ring without repeated vertices
    fn ring_points(&mut self, ring: &LineString<f64>) -> Vec<usize> {
        let mut ids: Vec<usize> = Vec::new();
        for c in ring.coords() {
            let id = self.point(*c);
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
        if ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        ids
    }

    fn split_at_vertices(&self, ids: &[usize]) -> Vec<usize> {
        let mut split = Vec::with_capacity(ids.len());
        for (k, &a) in ids.iter().enumerate() {
            split.push(a);
            split.extend(self.points_on_segment(a, ids[(k + 1) % ids.len()]));
        }
        split
    }

    /// Points strictly inside the segment `a`-`b`, ordered from `a`
    fn points_on_segment(&self, a: usize, b: usize) -> Vec<usize> {
        let (pa, pb) = (self.points[a], self.points[b]);
        let (dx, dy) = (pb.x - pa.x, pb.y - pa.y);
        let length = dx.hypot(dy);
        if length == 0.0 {
            return Vec::new();
        }
        let mut inner: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != a && *i != b)
            .filter_map(|(i, p)| {
                let t = ((p.x - pa.x) * dx + (p.y - pa.y) * dy) / (length * length);
                let distance = ((p.x - pa.x) * dy - (p.y - pa.y) * dx).abs() / length;
                (t > 0.0 && t < 1.0 && distance < POINT_TOLERANCE).then_some((t, i))
            })
            .collect();
        inner.sort_by(|l, r| l.0.total_cmp(&r.0));
        inner.into_iter().map(|(_, i)| i).collect()
    }

    /// Signed tag of the curve from `a` to `b`
    fn curve(&mut self, a: usize, b: usize) -> i32 {
        let tag = *self.curve_ids.entry((a.min(b), a.max(b))).or_insert_with(|| {
            self.curves.push((a, b));
            tag_of(self.curves.len() - 1)
        });
        let forward = index_of(tag).map(|i| self.curves[i].0 == a).unwrap_or(true);
        if forward {
            tag
        } else {
            -tag
        }
    }

    fn curve_points(&self, tag: i32) -> Option<(usize, usize)> {
        index_of(tag).and_then(|i| self.curves.get(i)).copied()
    }

    fn inside(&self, search: &SearchBox, point: usize) -> bool {
        let p = self.points[point];
        p.x >= search[0] && p.x <= search[3] && p.y >= search[1] && p.y <= search[4]
    }

    fn curve_inside(&self, search: &SearchBox, curve: usize) -> bool {
        let (a, b) = self.curves[curve];
        self.inside(search, a) && self.inside(search, b)
    }
}

#[derive(Debug, Clone)]
struct PhysicalGroup {
    dim: i32,
    tag: i32,
    name: String,
    tags: Vec<i32>,
}

/// [`MeshEngine`] writing a `.geo` script and running gmsh on it
#[derive(Debug, Clone)]
pub struct GmshProcess {
    program: PathBuf,
    model: String,
    surfaces: IndexMap<i32, Polygon<f64>>,
    next_surface: i32,
    topology: Option<Topology>,
    groups: Vec<PhysicalGroup>,
    commands: Vec<String>,
    next_field: i32,
    written: Option<PathBuf>,
}

impl Default for GmshProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl GmshProcess {
    /// Engine running `gmsh` from the search path
    pub fn new() -> Self {
        Self::with_program("gmsh")
    }

    /// Engine running the given gmsh executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            model: String::new(),
            surfaces: IndexMap::new(),
            next_surface: 0,
            topology: None,
            groups: Vec::new(),
            commands: Vec::new(),
            next_field: 0,
            written: None,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn reset(&mut self) {
        *self = Self::with_program(std::mem::take(&mut self.program));
    }

    fn insert_surface(&mut self, polygon: Polygon<f64>) -> i32 {
        self.next_surface += 1;
        self.surfaces.insert(self.next_surface, polygon);
        self.topology = None;
        self.next_surface
    }

    /// Polygons of the given surfaces, removed from the model when `remove`
    fn surfaces_of(&mut self, dim_tags: &[DimTag], remove: bool) -> Result<Vec<Polygon<f64>>> {
        let mut found = Vec::with_capacity(dim_tags.len());
        for dim_tag in dim_tags {
            let polygon = match (dim_tag.dim, remove) {
                (2, true) => self.surfaces.shift_remove(&dim_tag.tag),
                (2, false) => self.surfaces.get(&dim_tag.tag).cloned(),
                _ => None,
            };
            found.push(polygon.ok_or_else(|| unknown(dim_tag))?);
        }
        if remove {
            self.topology = None;
        }
        Ok(found)
    }

    fn topology(&self) -> Result<&Topology> {
        self.topology
            .as_ref()
            .ok_or_else(|| Error::Mesh(format!("model '{}' is not synchronized", self.model)))
    }

    /// The `.geo` script that meshes the model into `msh_file`
    pub fn script(&self, msh_file: &Path) -> String {
        let mut script = format!("// {}\n", self.model);
        if let Some(topology) = &self.topology {
            for (i, p) in topology.points.iter().enumerate() {
                script.push_str(&format!("Point({}) = {{{}, {}, 0}};\n", tag_of(i), p.x, p.y));
            }
            for (i, (a, b)) in topology.curves.iter().enumerate() {
                script.push_str(&format!("Line({}) = {{{}, {}}};\n", tag_of(i), tag_of(*a), tag_of(*b)));
            }
            let mut next_loop = 0;
            for (tag, loops) in &topology.surfaces {
                let mut loop_tags = Vec::with_capacity(loops.len());
                for curves in loops {
                    next_loop += 1;
                    script.push_str(&format!("Curve Loop({}) = {{{}}};\n", next_loop, join(curves)));
                    loop_tags.push(next_loop);
                }
                script.push_str(&format!("Plane Surface({}) = {{{}}};\n", tag, join(&loop_tags)));
            }
        }
        for group in &self.groups {
            let kind = match group.dim {
                0 => "Point",
                1 => "Curve",
                _ => "Surface",
            };
            script.push_str(&format!(
                "Physical {}(\"{}\", {}) = {{{}}};\n",
                kind,
                group.name,
                group.tag,
                join(&group.tags)
            ));
        }
        for command in &self.commands {
            script.push_str(command);
            script.push('\n');
        }
        script.push_str(&format!("Save \"{}\";\n", msh_file.display().to_string().replace('\\', "/")));
        script
    }

    fn run(&self, args: &[&Path]) -> Result<std::process::Output> {
        tracing::debug!("Running {} {:?}", self.program.display(), args);
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| Error::Mesh(format!("cannot run {}: {}", self.program.display(), e)))
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(T::to_string).collect::<Vec<_>>().join(", ")
}

/// Last lines of the gmsh log, stderr first
fn log_tail(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let log = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    let lines: Vec<&str> = log.lines().collect();
    lines[lines.len().saturating_sub(LOG_TAIL)..].join("\n")
}

impl MeshEngine for GmshProcess {
    fn initialize(&mut self) -> Result<()> {
        self.reset();
        tracing::debug!("Using gmsh at {}", self.program.display());
        Ok(())
    }

    fn add_model(&mut self, name: &str) -> Result<()> {
        self.reset();
        self.model = name.to_string();
        Ok(())
    }

    fn add_polygon(&mut self, points: &[[f64; 3]]) -> Result<i32> {
        if points.len() < 3 {
            return Err(Error::Mesh(format!(
                "a plane surface needs three points, got {}",
                points.len()
            )));
        }
        let ring: LineString<f64> = points.iter().map(|p| (p[0], p[1])).collect();
        Ok(self.insert_surface(Polygon::new(ring, Vec::new())))
    }

    fn cut(&mut self, objects: &[DimTag], tools: &[DimTag]) -> Result<Vec<DimTag>> {
        let tool_shapes = self.surfaces_of(tools, true)?;
        let tool_area = tool_shapes
            .into_iter()
            .fold(MultiPolygon::new(Vec::new()), |area, tool| {
                area.union(&MultiPolygon::new(vec![tool]))
            });

        let mut result = Vec::new();
        for dim_tag in objects {
            let object = self
                .surfaces_of(&[*dim_tag], true)?
                .pop()
                .ok_or_else(|| unknown(dim_tag))?;
            let mut pieces = significant(MultiPolygon::new(vec![object]).difference(&tool_area)).into_iter();
            // The first piece keeps the object's tag
            if let Some(first) = pieces.next() {
                self.surfaces.insert(dim_tag.tag, first);
                result.push(*dim_tag);
            }
            for piece in pieces {
                result.push(DimTag::surface(self.insert_surface(piece)));
            }
        }
        self.topology = None;
        Ok(result)
    }

    fn fragment(
        &mut self,
        objects: &[DimTag],
        tools: &[DimTag],
        remove_tool: bool,
    ) -> Result<(Vec<DimTag>, Vec<Vec<DimTag>>)> {
        let mut inputs = self.surfaces_of(objects, true)?;
        inputs.extend(self.surfaces_of(tools, remove_tool)?);

        // Pieces of the partition with the inputs covering them
        let mut pieces: Vec<(MultiPolygon<f64>, Vec<usize>)> = Vec::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let mut rest = MultiPolygon::new(vec![input]);
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for (piece, owners) in pieces {
                let shared = piece.intersection(&rest);
                let own = piece.difference(&rest);
                rest = rest.difference(&piece);
                if shared.unsigned_area() > AREA_TOLERANCE {
                    let mut shared_owners = owners.clone();
                    shared_owners.push(index);
                    next.push((shared, shared_owners));
                }
                if own.unsigned_area() > AREA_TOLERANCE {
                    next.push((own, owners));
                }
            }
            if rest.unsigned_area() > AREA_TOLERANCE {
                next.push((rest, vec![index]));
            }
            pieces = next;
        }

        let mut all = Vec::new();
        let mut mapping = vec![Vec::new(); objects.len() + tools.len()];
        for (piece, owners) in pieces {
            for polygon in significant(piece) {
                let dim_tag = DimTag::surface(self.insert_surface(polygon));
                all.push(dim_tag);
                for owner in &owners {
                    mapping[*owner].push(dim_tag);
                }
            }
        }
        tracing::debug!("Fragmented {} surfaces into {}", mapping.len(), all.len());
        Ok((all, mapping))
    }

    fn synchronize(&mut self) -> Result<()> {
        let topology = Topology::build(&self.surfaces);
        tracing::debug!(
            "Model '{}' has {} points, {} curves and {} surfaces",
            self.model,
            topology.points.len(),
            topology.curves.len(),
            topology.surfaces.len()
        );
        self.topology = Some(topology);
        Ok(())
    }

    fn boundary(&mut self, dim_tags: &[DimTag]) -> Result<Vec<DimTag>> {
        let topology = self.topology()?;
        let mut found: IndexSet<DimTag> = IndexSet::new();
        for dim_tag in dim_tags {
            match dim_tag.dim {
                2 => {
                    let loops = topology.surfaces.get(&dim_tag.tag).ok_or_else(|| unknown(dim_tag))?;
                    found.extend(loops.iter().flatten().map(|c| DimTag::curve(c.abs())));
                }
                1 => {
                    let (a, b) = topology.curve_points(dim_tag.tag).ok_or_else(|| unknown(dim_tag))?;
                    found.insert(DimTag::new(0, tag_of(a)));
                    found.insert(DimTag::new(0, tag_of(b)));
                }
                _ => {}
            }
        }
        Ok(found.into_iter().collect())
    }

    fn entities_in_bounding_box(&mut self, search: SearchBox, dim: i32) -> Result<Vec<DimTag>> {
        let topology = self.topology()?;
        if search[2] > 0.0 || search[5] < 0.0 {
            return Ok(Vec::new());
        }
        let found = match dim {
            0 => (0..topology.points.len())
                .filter(|p| topology.inside(&search, *p))
                .map(|p| DimTag::new(0, tag_of(p)))
                .collect(),
            1 => (0..topology.curves.len())
                .filter(|c| topology.curve_inside(&search, *c))
                .map(|c| DimTag::curve(tag_of(c)))
                .collect(),
            2 => topology
                .surfaces
                .iter()
                .filter(|(_, loops)| {
                    loops.iter().flatten().all(|c| {
                        index_of(c.abs()).is_some_and(|i| topology.curve_inside(&search, i))
                    })
                })
                .map(|(tag, _)| DimTag::surface(*tag))
                .collect(),
            _ => return Err(Error::Mesh(format!("no entities of dimension {}", dim))),
        };
        Ok(found)
    }

    fn add_physical_group(&mut self, dim: i32, tags: &[i32], name: &str) -> Result<i32> {
        if !(0..=2).contains(&dim) {
            return Err(Error::Mesh(format!("no physical groups of dimension {}", dim)));
        }
        let tag = tag_of(self.groups.iter().filter(|g| g.dim == dim).count());
        self.groups.push(PhysicalGroup {
            dim,
            tag,
            name: name.to_string(),
            tags: tags.to_vec(),
        });
        Ok(tag)
    }

    fn set_option_number(&mut self, name: &str, value: f64) -> Result<()> {
        self.commands.push(format!("{} = {};", name, value));
        Ok(())
    }

    fn add_field(&mut self, kind: &str) -> Result<i32> {
        self.next_field += 1;
        self.commands.push(format!("Field[{}] = {};", self.next_field, kind));
        Ok(self.next_field)
    }

    fn set_field_number(&mut self, field: i32, option: &str, value: f64) -> Result<()> {
        self.commands.push(format!("Field[{}].{} = {};", field, option, value));
        Ok(())
    }

    fn set_field_numbers(&mut self, field: i32, option: &str, values: &[f64]) -> Result<()> {
        self.commands
            .push(format!("Field[{}].{} = {{{}}};", field, option, join(values)));
        Ok(())
    }

    fn set_background_field(&mut self, field: i32) -> Result<()> {
        self.commands.push(format!("Background Field = {};", field));
        Ok(())
    }

    fn generate(&mut self, dim: i32) -> Result<()> {
        if !self.surfaces.is_empty() {
            self.topology()?;
        }
        self.commands.push(format!("Mesh {};", dim));
        Ok(())
    }

    fn optimize(&mut self, optimizer: &MeshOptimizer) -> Result<()> {
        if optimizer.force {
            tracing::debug!("Scripted mesh optimisation cannot be forced");
        }
        for _ in 0..optimizer.niter.max(1) {
            self.commands.push(format!("OptimizeMesh \"{}\";", optimizer.method));
        }
        Ok(())
    }

    fn write(&mut self, path: &Path) -> Result<()> {
        let script_file = path.with_extension("geo");
        std::fs::write(&script_file, self.script(path))?;
        tracing::info!("Meshing {} with {}", script_file.display(), self.program.display());

        let output = self.run(&[script_file.as_path(), Path::new("-")])?;
        if !output.status.success() || !path.exists() {
            return Err(Error::Mesh(format!(
                "gmsh did not write {} ({}):\n{}",
                path.display(),
                output.status,
                log_tail(&output)
            )));
        }
        self.written = Some(path.to_path_buf());
        Ok(())
    }

    fn run_gui(&mut self) -> Result<()> {
        let Some(msh_file) = self.written.clone() else {
            return Err(Error::Mesh("no mesh written to show".to_string()));
        };
        let output = self.run(&[msh_file.as_path()])?;
        if !output.status.success() {
            tracing::warn!("gmsh viewer exited with {}", output.status);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.reset();
        Ok(())
    }
}
