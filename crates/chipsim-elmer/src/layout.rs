//! Cross-section layout
//!
//! Loads the top cell of a GDSII file into per-layer polygons in µm and
//! prepares them for the mesher: overlapping shapes of a layer are merged and
//! every merged polygon is split into its hull and holes.

use chipsim_core::{Error, Result};
use gds21::{GdsElement, GdsLibrary, GdsPath, GdsPoint, GdsStrans, GdsStruct};
use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Axis-aligned bounding box in µm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    fn of_point(x: f64, y: f64) -> Self {
        Self {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        self.x_min = self.x_min.min(x);
        self.y_min = self.y_min.min(y);
        self.x_max = self.x_max.max(x);
        self.y_max = self.y_max.max(y);
    }

    /// Width of the box
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the box
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Outline of one merged polygon as mesher input
///
/// Rings are open (the first point is not repeated) and lie in the z = 0
/// plane.
#[derive(Debug, Clone, PartialEq)]
pub struct HullAndHoles {
    pub hull: Vec<[f64; 3]>,
    pub holes: Vec<Vec<[f64; 3]>>,
}

/// Polygons of the top cell keyed by layer number (datatype 0)
#[derive(Debug, Clone, Default)]
pub struct Layout {
    layers: IndexMap<u32, Vec<Polygon<f64>>>,
    bbox: Option<BoundingBox>,
}

impl Layout {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a polygon in µm to `layer`
    pub fn add_polygon(&mut self, layer: u32, polygon: Polygon<f64>) {
        self.include_polygon(&polygon);
        self.layers.entry(layer).or_default().push(polygon);
    }

    /// Add a rectangle in µm to `layer`
    pub fn add_rectangle(&mut self, layer: u32, x_min: f64, y_min: f64, x_max: f64, y_max: f64) {
        let ring = LineString::from(vec![
            (x_min, y_min),
            (x_max, y_min),
            (x_max, y_max),
            (x_min, y_max),
            (x_min, y_min),
        ]);
        self.add_polygon(layer, Polygon::new(ring, Vec::new()));
    }

    fn include_polygon(&mut self, polygon: &Polygon<f64>) {
        for c in polygon.exterior().coords() {
            self.include(c.x, c.y);
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        match self.bbox.as_mut() {
            Some(bbox) => bbox.include(x, y),
            None => self.bbox = Some(BoundingBox::of_point(x, y)),
        }
    }

    /// Bounding box of every shape of the cell
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.bbox
    }

    /// Raw polygons of `layer`
    pub fn polygons(&self, layer: u32) -> &[Polygon<f64>] {
        self.layers.get(&layer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Polygons of `layer` with overlapping shapes merged
    pub fn merged_polygons(&self, layer: u32) -> MultiPolygon<f64> {
        self.polygons(layer)
            .iter()
            .fold(MultiPolygon::new(Vec::new()), |merged, polygon| {
                merged.union(&MultiPolygon::new(vec![polygon.clone()]))
            })
    }
}

/// Load the top cell of a GDSII file
///
/// The top cell is the first structure not referenced by any other.
/// Boundaries, boxes and paths of the top cell go into the layers (datatype
/// 0 only, coordinates in µm). The bounding box covers every shape of the top
/// cell and of the cells it instantiates, whatever the datatype.
pub fn read_gds(path: &Path) -> Result<Layout> {
    let library = GdsLibrary::load(path)
        .map_err(|e| Error::Layout(format!("{}: {:?}", path.display(), e)))?;
    let dbu = library.units.db_unit() * 1e6;

    let cells: HashMap<&str, &GdsStruct> = library
        .structs
        .iter()
        .map(|s| (s.name.as_str(), s))
        .collect();
    let referenced: HashSet<&str> = library
        .structs
        .iter()
        .flat_map(|s| s.elems.iter())
        .filter_map(|elem| match elem {
            GdsElement::GdsStructRef(r) => Some(r.name.as_str()),
            GdsElement::GdsArrayRef(r) => Some(r.name.as_str()),
            _ => None,
        })
        .collect();
    let top = library
        .structs
        .iter()
        .find(|s| !referenced.contains(s.name.as_str()))
        .ok_or_else(|| Error::Layout(format!("{}: no top cell", path.display())))?;
    tracing::debug!("Top cell {} of {}", top.name, path.display());

    let mut layout = Layout::new();
    for elem in &top.elems {
        let (layer, datatype, polygons) = match elem {
            GdsElement::GdsBoundary(b) => (b.layer, b.datatype, vec![ring_polygon(&b.xy, dbu)]),
            GdsElement::GdsBox(b) => (b.layer, b.boxtype, vec![ring_polygon(&b.xy, dbu)]),
            GdsElement::GdsPath(p) => (p.layer, p.datatype, path_polygons(p, dbu)),
            _ => continue,
        };
        if datatype != 0 {
            for polygon in &polygons {
                layout.include_polygon(polygon);
            }
            continue;
        }
        let Ok(layer) = u32::try_from(layer) else {
            tracing::warn!("Skipping shape on negative layer {}", layer);
            continue;
        };
        for polygon in polygons {
            layout.add_polygon(layer, polygon);
        }
    }

    let mut visiting = vec![top.name.as_str()];
    for (name, placement) in instances(top) {
        let Some(child) = cell_extent(&cells, name, &mut visiting)? else {
            continue;
        };
        for (x, y) in child.corners() {
            let (x, y) = placement.apply(x, y);
            layout.include(x * dbu, y * dbu);
        }
    }
    Ok(layout)
}

fn ring_polygon(points: &[GdsPoint], dbu: f64) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = points
        .iter()
        .map(|p| Coord {
            x: f64::from(p.x) * dbu,
            y: f64::from(p.y) * dbu,
        })
        .collect();
    Polygon::new(LineString::new(coords), Vec::new())
}

/// Outline of a path as one rectangle per segment
///
/// Segments are extended by half the width at inner vertices so that bends
/// are covered. Path ends are flush, except for square ends (type 2) and
/// explicit extensions (type 4).
fn path_polygons(path: &GdsPath, dbu: f64) -> Vec<Polygon<f64>> {
    let width = f64::from(path.width.unwrap_or(0)).abs() * dbu;
    if width == 0.0 {
        tracing::warn!("Skipping path of zero width on layer {}", path.layer);
        return Vec::new();
    }
    let half = width / 2.0;
    let (begin, end) = match path.path_type {
        Some(2) => (half, half),
        Some(4) => (
            f64::from(path.begin_extn.unwrap_or(0)) * dbu,
            f64::from(path.end_extn.unwrap_or(0)) * dbu,
        ),
        _ => (0.0, 0.0),
    };

    let points: Vec<(f64, f64)> = path
        .xy
        .iter()
        .map(|p| (f64::from(p.x) * dbu, f64::from(p.y) * dbu))
        .collect();
    let last = points.len().saturating_sub(2);
    points
        .windows(2)
        .enumerate()
        .filter_map(|(i, segment)| {
            let ((x0, y0), (x1, y1)) = (segment[0], segment[1]);
            let length = (x1 - x0).hypot(y1 - y0);
            if length == 0.0 {
                return None;
            }
            let (ux, uy) = ((x1 - x0) / length, (y1 - y0) / length);
            let (nx, ny) = (-uy * half, ux * half);
            let back = if i == 0 { begin } else { half };
            let ahead = if i == last { end } else { half };
            let (ax, ay) = (x0 - ux * back, y0 - uy * back);
            let (bx, by) = (x1 + ux * ahead, y1 + uy * ahead);
            let ring = LineString::from(vec![
                (ax + nx, ay + ny),
                (ax - nx, ay - ny),
                (bx - nx, by - ny),
                (bx + nx, by + ny),
                (ax + nx, ay + ny),
            ]);
            Some(Polygon::new(ring, Vec::new()))
        })
        .collect()
}

/// Extent of a cell in database units
#[derive(Debug, Clone, Copy)]
struct Extent {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl Extent {
    fn include(extent: &mut Option<Extent>, x: f64, y: f64) {
        match extent {
            Some(e) => {
                e.x_min = e.x_min.min(x);
                e.y_min = e.y_min.min(y);
                e.x_max = e.x_max.max(x);
                e.y_max = e.y_max.max(y);
            }
            None => {
                *extent = Some(Extent {
                    x_min: x,
                    y_min: y,
                    x_max: x,
                    y_max: y,
                })
            }
        }
    }

    fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.x_min, self.y_min),
            (self.x_max, self.y_min),
            (self.x_max, self.y_max),
            (self.x_min, self.y_max),
        ]
    }
}

/// Placement of a cell instance: reflection about x, magnification,
/// rotation, then translation
#[derive(Debug, Clone, Copy)]
struct Placement {
    x: f64,
    y: f64,
    reflected: bool,
    magnification: f64,
    angle: f64,
}

impl Placement {
    fn new(x: f64, y: f64, strans: Option<&GdsStrans>) -> Self {
        Self {
            x,
            y,
            reflected: strans.is_some_and(|s| s.reflected),
            magnification: strans.and_then(|s| s.mag).unwrap_or(1.0),
            angle: strans.and_then(|s| s.angle).unwrap_or(0.0).to_radians(),
        }
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let y = if self.reflected { -y } else { y };
        let (x, y) = (x * self.magnification, y * self.magnification);
        let (sin, cos) = self.angle.sin_cos();
        (self.x + x * cos - y * sin, self.y + x * sin + y * cos)
    }
}

/// Cell instances of `cell` with their placements; arrays are expanded
fn instances(cell: &GdsStruct) -> Vec<(&str, Placement)> {
    let mut placed = Vec::new();
    for elem in &cell.elems {
        match elem {
            GdsElement::GdsStructRef(r) => placed.push((
                r.name.as_str(),
                Placement::new(f64::from(r.xy.x), f64::from(r.xy.y), r.strans.as_ref()),
            )),
            GdsElement::GdsArrayRef(r) => {
                let cols = i32::from(r.cols.max(1));
                let rows = i32::from(r.rows.max(1));
                let [origin, col_end, row_end] = &r.xy;
                let step = |end: &GdsPoint, n: i32| {
                    (
                        f64::from(end.x - origin.x) / f64::from(n),
                        f64::from(end.y - origin.y) / f64::from(n),
                    )
                };
                let (col_x, col_y) = step(col_end, cols);
                let (row_x, row_y) = step(row_end, rows);
                for c in 0..cols {
                    for r_index in 0..rows {
                        let (c, r_index) = (f64::from(c), f64::from(r_index));
                        placed.push((
                            r.name.as_str(),
                            Placement::new(
                                f64::from(origin.x) + c * col_x + r_index * row_x,
                                f64::from(origin.y) + c * col_y + r_index * row_y,
                                r.strans.as_ref(),
                            ),
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    placed
}

/// Extent of the named cell including its instances
fn cell_extent<'a>(
    cells: &HashMap<&'a str, &'a GdsStruct>,
    name: &'a str,
    visiting: &mut Vec<&'a str>,
) -> Result<Option<Extent>> {
    let Some(&cell) = cells.get(name) else {
        tracing::warn!("Instance of unknown cell {}", name);
        return Ok(None);
    };
    if visiting.contains(&name) {
        return Err(Error::Layout(format!("cell {} instantiates itself", name)));
    }
    visiting.push(name);

    let mut extent = None;
    for elem in &cell.elems {
        match elem {
            GdsElement::GdsBoundary(b) => include_points(&mut extent, &b.xy, 0.0),
            GdsElement::GdsBox(b) => include_points(&mut extent, &b.xy, 0.0),
            GdsElement::GdsPath(p) => {
                let half = f64::from(p.width.unwrap_or(0)).abs() / 2.0;
                include_points(&mut extent, &p.xy, half);
            }
            _ => {}
        }
    }
    for (child_name, placement) in instances(cell) {
        if let Some(child) = cell_extent(cells, child_name, visiting)? {
            for (x, y) in child.corners() {
                let (x, y) = placement.apply(x, y);
                Extent::include(&mut extent, x, y);
            }
        }
    }

    visiting.pop();
    Ok(extent)
}

fn include_points(extent: &mut Option<Extent>, points: &[GdsPoint], margin: f64) {
    for p in points {
        let (x, y) = (f64::from(p.x), f64::from(p.y));
        Extent::include(extent, x - margin, y - margin);
        Extent::include(extent, x + margin, y + margin);
    }
}

fn open_ring(ring: &LineString<f64>) -> Vec<[f64; 3]> {
    let mut points: Vec<[f64; 3]> = ring.coords().map(|c| [c.x, c.y, 0.0]).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Split a polygon into its hull and holes
pub fn separated_hull_and_holes(polygon: &Polygon<f64>) -> HullAndHoles {
    HullAndHoles {
        hull: open_ring(polygon.exterior()),
        holes: polygon.interiors().iter().map(open_ring).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_rectangles_merge() {
        let mut layout = Layout::new();
        layout.add_rectangle(1, 0.0, 0.0, 2.0, 1.0);
        layout.add_rectangle(1, 1.0, 0.0, 3.0, 1.0);
        layout.add_rectangle(2, 10.0, 10.0, 11.0, 11.0);

        assert_eq!(layout.merged_polygons(1).0.len(), 1);
        assert_eq!(layout.merged_polygons(2).0.len(), 1);
        assert!(layout.merged_polygons(3).0.is_empty());

        let bbox = layout.bbox().expect("shapes");
        assert_eq!((bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max), (0.0, 0.0, 11.0, 11.0));
        assert_eq!((bbox.width(), bbox.height()), (11.0, 11.0));
    }

    #[test]
    fn test_hull_and_holes() {
        let hole = LineString::from(vec![(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0), (1.0, 1.0)]);
        let ring = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        let split = separated_hull_and_holes(&Polygon::new(ring, vec![hole]));

        assert_eq!(split.hull.len(), 4);
        assert_eq!(split.holes.len(), 1);
        assert_eq!(split.holes[0].len(), 4);
        assert!(split.hull.iter().all(|p| p[2] == 0.0));
    }
}
