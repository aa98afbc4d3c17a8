//! Geometry command builders
//!
//! Each function assembles the nested token lists of one modeler operation
//! and issues it against the editor handle. Operations whose selection is
//! empty, or whose extent is zero, are skipped without touching the editor.

use crate::session::{call, ScriptObject};
use crate::token::Token;
use crate::tokens;
use chipsim_core::{format_position, MaterialProperties, MaterialTable, Position, Result, PEC};
use std::f64::consts::PI;

pub use chipsim_core::match_layer;

/// Layer type used when none is given to [`add_layer`]
pub const DEFAULT_LAYER_TYPE: &str = "signal";

fn formatted(value: impl Into<Position>, units: &str) -> Token {
    Token::from(format_position(&value.into(), units))
}

fn selection(objects: &[String]) -> String {
    objects.join(",")
}

fn attribute_tab(objects: &[String], changed_props: Vec<Token>) -> Vec<Token> {
    let mut prop_servers = tokens!["NAME:PropServers"];
    prop_servers.extend(objects.iter().map(Token::from));

    let mut changed = tokens!["NAME:ChangedProps"];
    changed.extend(changed_props);

    vec![Token::List(tokens![
        "NAME:AllTabs",
        tokens!["NAME:Geometry3DAttributeTab", prop_servers, changed],
    ])]
}

/// Create a covered rectangle in the plane normal to `axis`
///
/// Nothing is created when the width or height is zero.
#[allow(clippy::too_many_arguments)]
pub fn create_rectangle(
    editor: &mut dyn ScriptObject,
    name: &str,
    x: impl Into<Position>,
    y: impl Into<Position>,
    z: impl Into<Position>,
    width: impl Into<Position>,
    height: impl Into<Position>,
    axis: &str,
    units: &str,
) -> Result<()> {
    let (width, height) = (width.into(), height.into());
    if width.is_zero() || height.is_zero() {
        return Ok(());
    }
    call(
        editor,
        "CreateRectangle",
        vec![
            Token::List(tokens![
                "NAME:RectangleParameters",
                "IsCovered:=",
                true,
                "XStart:=",
                formatted(x, units),
                "YStart:=",
                formatted(y, units),
                "ZStart:=",
                formatted(z, units),
                "Width:=",
                formatted(width, units),
                "Height:=",
                formatted(height, units),
                "WhichAxis:=",
                axis,
            ]),
            Token::List(tokens!["NAME:Attributes", "Name:=", name, "PartCoordinateSystem:=", "Global"]),
        ],
    )
}

/// Create a closed, covered polyline through `points`
///
/// The outline is closed by repeating the first point. An empty point list
/// creates nothing.
pub fn create_polygon(
    editor: &mut dyn ScriptObject,
    name: &str,
    points: &[[f64; 3]],
    units: &str,
) -> Result<()> {
    let Some(first) = points.first() else {
        return Ok(());
    };

    let mut polyline_points = tokens!["NAME:PolylinePoints"];
    polyline_points.extend(points.iter().chain(std::iter::once(first)).map(|p| {
        Token::List(tokens![
            "NAME:PLPoint",
            "X:=",
            formatted(p[0], units),
            "Y:=",
            formatted(p[1], units),
            "Z:=",
            formatted(p[2], units),
        ])
    }));

    let mut segments = tokens!["NAME:PolylineSegments"];
    segments.extend((0..points.len()).map(|i| {
        Token::List(tokens![
            "NAME:PLSegment",
            "SegmentType:=",
            "Line",
            "StartIndex:=",
            i,
            "NoOfPoints:=",
            2,
        ])
    }));

    let zero = format!("0{}", units);
    call(
        editor,
        "CreatePolyline",
        vec![
            Token::List(tokens![
                "NAME:PolylineParameters",
                "IsPolylineCovered:=",
                true,
                "IsPolylineClosed:=",
                true,
                polyline_points,
                segments,
                tokens![
                    "NAME:PolylineXSection",
                    "XSectionType:=",
                    "None",
                    "XSectionOrient:=",
                    "Auto",
                    "XSectionWidth:=",
                    zero.as_str(),
                    "XSectionTopWidth:=",
                    zero.as_str(),
                    "XSectionHeight:=",
                    zero.as_str(),
                    "XSectionNumSegments:=",
                    "0",
                    "XSectionBendType:=",
                    "Corner",
                ],
            ]),
            Token::List(tokens![
                "NAME:Attributes",
                "Name:=",
                name,
                "Flags:=",
                "",
                "PartCoordinateSystem:=",
                "Global",
            ]),
        ],
    )
}

/// Create an axis-aligned box
///
/// Nothing is created when any size is zero.
#[allow(clippy::too_many_arguments)]
pub fn create_box(
    editor: &mut dyn ScriptObject,
    name: &str,
    x: impl Into<Position>,
    y: impl Into<Position>,
    z: impl Into<Position>,
    size_x: impl Into<Position>,
    size_y: impl Into<Position>,
    size_z: impl Into<Position>,
    units: &str,
) -> Result<()> {
    let (size_x, size_y, size_z) = (size_x.into(), size_y.into(), size_z.into());
    if size_x.is_zero() || size_y.is_zero() || size_z.is_zero() {
        return Ok(());
    }
    call(
        editor,
        "CreateBox",
        vec![
            Token::List(tokens![
                "NAME:BoxParameters",
                "XPosition:=",
                formatted(x, units),
                "YPosition:=",
                formatted(y, units),
                "ZPosition:=",
                formatted(z, units),
                "XSize:=",
                formatted(size_x, units),
                "YSize:=",
                formatted(size_y, units),
                "ZSize:=",
                formatted(size_z, units),
            ]),
            Token::List(tokens![
                "NAME:Attributes",
                "Name:=",
                name,
                "MaterialValue:=",
                "\"\"",
                "Flags:=",
                "",
                "PartCoordinateSystem:=",
                "Global",
            ]),
        ],
    )
}

/// Sweep sheets along +z into solids of the given thickness
pub fn thicken_sheet(
    editor: &mut dyn ScriptObject,
    objects: &[String],
    thickness: f64,
    units: &str,
) -> Result<()> {
    if objects.is_empty() || thickness == 0.0 {
        return Ok(());
    }
    call(
        editor,
        "SweepAlongVector",
        vec![
            Token::List(tokens![
                "NAME:Selections",
                "Selections:=",
                selection(objects),
                "NewPartsModelFlag:=",
                "Model",
            ]),
            Token::List(tokens![
                "NAME:VectorSweepParameters",
                "DraftAngle:=",
                "0deg",
                "DraftType:=",
                "Round",
                "CheckFaceFaceIntersection:=",
                false,
                "SweepVectorX:=",
                "0um",
                "SweepVectorY:=",
                "0um",
                "SweepVectorZ:=",
                format!("{} {}", thickness, units),
            ]),
        ],
    )
}

/// Assign a material, or mark the objects as non-model when `material` is `None`
///
/// When `solve_inside` is given it is set first, in a separate call.
pub fn set_material(
    editor: &mut dyn ScriptObject,
    objects: &[String],
    material: Option<&str>,
    solve_inside: Option<bool>,
) -> Result<()> {
    if objects.is_empty() {
        return Ok(());
    }
    if let Some(solve_inside) = solve_inside {
        call(
            editor,
            "ChangeProperty",
            attribute_tab(
                objects,
                vec![Token::List(tokens!["NAME:Solve Inside", "Value:=", solve_inside])],
            ),
        )?;
    }
    let changed = match material {
        Some(material) => tokens!["NAME:Material", "Value:=", format!("\"{}\"", material)],
        None => tokens!["NAME:Model", "Value:=", false],
    };
    call(editor, "ChangeProperty", attribute_tab(objects, vec![Token::List(changed)]))
}

/// Layer and order maps of a layout import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerMap {
    layers: Vec<Token>,
    order: Vec<Token>,
}

impl LayerMap {
    /// Create empty maps
    pub fn new() -> Self {
        Self::default()
    }

    /// The `NAME:LayerMap` list
    pub fn layer_map(&self) -> Token {
        let mut map = tokens!["NAME:LayerMap"];
        map.extend(self.layers.iter().cloned());
        Token::List(map)
    }

    /// The flat `entry:=` order list
    pub fn order_map(&self) -> Token {
        Token::List(self.order.clone())
    }

    /// Number of mapped layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layer is mapped
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Map layout layer `layer_num` to the model layer `dest_layer`
pub fn add_layer(
    layer_map: &mut LayerMap,
    layer_num: u32,
    dest_layer: &str,
    order: usize,
    layer_type: &str,
) {
    layer_map.layers.push(Token::List(tokens![
        "NAME:LayerMapInfo",
        "LayerNum:=",
        layer_num,
        "DestLayer:=",
        dest_layer,
        "layer_type:=",
        layer_type,
    ]));
    layer_map.order.push(Token::from("entry:="));
    layer_map
        .order
        .push(Token::List(tokens!["order:=", order, "layer:=", dest_layer]));
}

/// Translate objects along z
pub fn move_vertically(
    editor: &mut dyn ScriptObject,
    objects: &[String],
    z_shift: f64,
    units: &str,
) -> Result<()> {
    if objects.is_empty() || z_shift == 0.0 {
        return Ok(());
    }
    call(
        editor,
        "Move",
        vec![
            Token::List(tokens![
                "NAME:Selections",
                "Selections:=",
                selection(objects),
                "NewPartsModelFlag:=",
                "Model",
            ]),
            Token::List(tokens![
                "NAME:TranslateParameters",
                "TranslateVectorX:=",
                format!("0 {}", units),
                "TranslateVectorY:=",
                format!("0 {}", units),
                "TranslateVectorZ:=",
                format!("{} {}", z_shift, units),
            ]),
        ],
    )
}

/// Duplicate objects, returning the names of the copies
pub fn copy_paste(editor: &mut dyn ScriptObject, objects: &[String]) -> Result<Vec<String>> {
    if objects.is_empty() {
        return Ok(Vec::new());
    }
    call(
        editor,
        "Copy",
        vec![Token::List(tokens!["NAME:Selections", "Selections:=", selection(objects)])],
    )?;
    Ok(editor.invoke("Paste", Vec::new())?.into_strings())
}

/// Delete objects
pub fn delete(editor: &mut dyn ScriptObject, objects: &[String]) -> Result<()> {
    if objects.is_empty() {
        return Ok(());
    }
    call(
        editor,
        "Delete",
        vec![Token::List(tokens!["NAME:Selections", "Selections:=", selection(objects)])],
    )
}

/// Subtract `tool_objects` from `objects`
pub fn subtract(
    editor: &mut dyn ScriptObject,
    objects: &[String],
    tool_objects: &[String],
    keep_originals: bool,
) -> Result<()> {
    if objects.is_empty() || tool_objects.is_empty() {
        return Ok(());
    }
    call(
        editor,
        "Subtract",
        vec![
            Token::List(tokens![
                "NAME:Selections",
                "Blank Parts:=",
                selection(objects),
                "Tool Parts:=",
                selection(tool_objects),
            ]),
            Token::List(tokens![
                "NAME:SubtractParameters",
                "KeepOriginals:=",
                keep_originals,
                "TurnOnNBodyBoolean:=",
                true,
            ]),
        ],
    )
}

/// Unite objects into the first one
///
/// Needs at least two objects.
pub fn unite(editor: &mut dyn ScriptObject, objects: &[String], keep_originals: bool) -> Result<()> {
    if objects.len() < 2 {
        return Ok(());
    }
    call(
        editor,
        "Unite",
        vec![
            Token::List(tokens!["NAME:Selections", "Selections:=", selection(objects)]),
            Token::List(tokens![
                "NAME:UniteParameters",
                "KeepOriginals:=",
                keep_originals,
                "TurnOnNBodyBoolean:=",
                true,
            ]),
        ],
    )
}

/// Define a material in the project library
pub fn add_material(
    definition_manager: &mut dyn ScriptObject,
    name: &str,
    properties: &MaterialProperties,
) -> Result<()> {
    let mut params = tokens![
        format!("NAME:{}", name),
        "CoordinateSystemType:=",
        "Cartesian",
        "BulkOrSurfaceType:=",
        1,
        tokens!["NAME:PhysicsTypes", "set:=", tokens!["Electromagnetic"]],
    ];
    for (key, value) in properties.iter() {
        params.push(Token::from(format!("{}:=", key)));
        params.push(Token::from(value.to_string()));
    }
    call(definition_manager, "AddMaterial", vec![Token::List(params)])
}

/// Display color of a model object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: i64,
    pub green: i64,
    pub blue: i64,
    pub transparency: f64,
}

impl From<Color> for (i64, i64, i64, f64) {
    fn from(c: Color) -> Self {
        (c.red, c.green, c.blue, c.transparency)
    }
}

/// Pick a display color for `material`
///
/// Conductors are drawn opaque-ish magenta. Dielectrics get a hue and
/// transparency that follow their permittivity, sheets more transparent
/// than solids.
pub fn color_by_material(material: &str, materials: &MaterialTable, is_sheet: bool) -> Color {
    if material == PEC || materials.is_conductor(material) {
        return Color {
            red: 240,
            green: 120,
            blue: 240,
            transparency: 0.5,
        };
    }
    let n = 0.3 * (materials.permittivity(material) - 1.0);
    let exponent = if is_sheet { 2.0 * n } else { n };
    let channel = |c: f64| (100.0 + 80.0 * c) as i64;
    Color {
        red: channel((n - PI / 3.0).cos()),
        green: channel((n + PI).cos()),
        blue: channel((n + PI / 3.0).cos()),
        transparency: 0.93f64.powf(exponent),
    }
}

/// Set color and transparency of objects
pub fn set_color(editor: &mut dyn ScriptObject, objects: &[String], color: &Color) -> Result<()> {
    if objects.is_empty() {
        return Ok(());
    }
    call(
        editor,
        "ChangeProperty",
        attribute_tab(
            objects,
            vec![
                Token::List(tokens![
                    "NAME:Color",
                    "R:=",
                    color.red,
                    "G:=",
                    color.green,
                    "B:=",
                    color.blue,
                ]),
                Token::List(tokens!["NAME:Transparent", "Value:=", color.transparency]),
            ],
        ),
    )
}

/// Scale objects uniformly about the origin
pub fn scale(editor: &mut dyn ScriptObject, objects: &[String], factor: f64) -> Result<()> {
    if objects.is_empty() || factor == 1.0 {
        return Ok(());
    }
    let factor = factor.to_string();
    call(
        editor,
        "Scale",
        vec![
            Token::List(tokens![
                "NAME:Selections",
                "Selections:=",
                selection(objects),
                "NewPartsModelFlag:=",
                "Model",
            ]),
            Token::List(tokens![
                "NAME:ScaleParameters",
                "ScaleX:=",
                factor.as_str(),
                "ScaleY:=",
                factor.as_str(),
                "ScaleZ:=",
                factor.as_str(),
            ]),
        ],
    )
}
