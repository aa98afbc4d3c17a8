use approx::assert_relative_eq;
use chipsim_ansys::*;
use chipsim_core::{MaterialProperties, MaterialTable};

fn names(objects: &[&str]) -> Vec<String> {
    objects.iter().map(|s| s.to_string()).collect()
}

fn editor() -> RecordingSession {
    RecordingSession::new("oEditor")
}

#[test]
fn test_create_box_layout() {
    let mut editor = editor();
    create_box(&mut editor, "Box1", 0, 0, 0, 10, 20, 5, "um").expect("created");

    assert_eq!(
        editor.script_lines(),
        vec![concat!(
            r#"oEditor.CreateBox(["NAME:BoxParameters", "XPosition:=", "0um", "YPosition:=", "0um", "ZPosition:=", "0um", "#,
            r#""XSize:=", "10um", "YSize:=", "20um", "ZSize:=", "5um"], "#,
            r#"["NAME:Attributes", "Name:=", "Box1", "MaterialValue:=", "\"\"", "Flags:=", "", "PartCoordinateSystem:=", "Global"])"#
        )]
    );
}

#[test]
fn test_zero_extent_is_skipped() {
    let mut editor = editor();
    create_box(&mut editor, "Flat", 0, 0, 0, 10, 20, 0.0, "um").expect("skipped");
    create_rectangle(&mut editor, "Line", 0, 0, 0, 0.0, 5, "Z", "um").expect("skipped");
    assert!(editor.calls().is_empty());
}

#[test]
fn test_symbolic_sizes_are_not_zero() {
    let mut editor = editor();
    create_rectangle(&mut editor, "R", 0, 0, "$z", "$w", 2, "Z", "mm").expect("created");

    let call = &editor.calls()[0];
    let params = call.args[0].to_string();
    assert!(params.contains(r#""ZStart:=", "$z""#));
    assert!(params.contains(r#""Width:=", "$w""#));
    assert!(params.contains(r#""Height:=", "2mm""#));
    assert!(params.ends_with(r#""WhichAxis:=", "Z"]"#));
}

#[test]
fn test_polygon_is_closed() {
    let mut editor = editor();
    let points = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    create_polygon(&mut editor, "Tri", &points, "um").expect("created");

    let params = editor.calls()[0].args[0].as_list().expect("list").to_vec();
    let polyline_points = params[5].as_list().expect("points");
    let segments = params[6].as_list().expect("segments");
    // name + 3 points + closing point
    assert_eq!(polyline_points.len(), 5);
    assert_eq!(polyline_points[1], polyline_points[4]);
    // name + one segment per edge
    assert_eq!(segments.len(), 4);
    assert_eq!(
        segments[3].to_string(),
        r#"["NAME:PLSegment", "SegmentType:=", "Line", "StartIndex:=", 2, "NoOfPoints:=", 2]"#
    );
    assert!(params[7].to_string().contains(r#""XSectionWidth:=", "0um""#));
}

#[test]
fn test_empty_polygon_is_skipped() {
    let mut editor = editor();
    create_polygon(&mut editor, "Nothing", &[], "um").expect("skipped");
    assert!(editor.calls().is_empty());
}

#[test]
fn test_empty_selection_guards() {
    let mut editor = editor();
    let none: Vec<String> = Vec::new();
    thicken_sheet(&mut editor, &none, 2.0, "um").expect("skipped");
    move_vertically(&mut editor, &none, 1.0, "um").expect("skipped");
    delete(&mut editor, &none).expect("skipped");
    subtract(&mut editor, &names(&["a"]), &none, false).expect("skipped");
    unite(&mut editor, &names(&["a"]), false).expect("skipped");
    set_material(&mut editor, &none, Some("silicon"), Some(true)).expect("skipped");
    set_color(&mut editor, &none, &color_by_material("pec", &MaterialTable::new(), true)).expect("skipped");
    scale(&mut editor, &names(&["a"]), 1.0).expect("skipped");
    assert!(copy_paste(&mut editor, &none).expect("skipped").is_empty());
    assert!(editor.calls().is_empty());
}

#[test]
fn test_thicken_and_move() {
    let mut editor = editor();
    let objects = names(&["sheet_1", "sheet_2"]);
    thicken_sheet(&mut editor, &objects, 0.2, "um").expect("swept");
    move_vertically(&mut editor, &objects, -1.5, "um").expect("moved");

    let lines = editor.script_lines();
    assert!(lines[0].starts_with(
        r#"oEditor.SweepAlongVector(["NAME:Selections", "Selections:=", "sheet_1,sheet_2", "NewPartsModelFlag:=", "Model"]"#
    ));
    assert!(lines[0].ends_with(r#""SweepVectorZ:=", "0.2 um"])"#));
    assert!(lines[1].ends_with(
        r#"["NAME:TranslateParameters", "TranslateVectorX:=", "0 um", "TranslateVectorY:=", "0 um", "TranslateVectorZ:=", "-1.5 um"])"#
    ));
}

#[test]
fn test_set_material_none_removes_from_model() {
    let mut editor = editor();
    set_material(&mut editor, &names(&["Box1", "Box2"]), None, None).expect("set");

    assert_eq!(
        editor.script_lines(),
        vec![concat!(
            r#"oEditor.ChangeProperty(["NAME:AllTabs", ["NAME:Geometry3DAttributeTab", "#,
            r#"["NAME:PropServers", "Box1", "Box2"], "#,
            r#"["NAME:ChangedProps", ["NAME:Model", "Value:=", False]]]])"#
        )]
    );
}

#[test]
fn test_copy_paste_returns_new_names() {
    let mut editor = editor();
    editor.respond("Paste", Token::List(vec!["Box1_1".into(), "Box2_1".into()]));

    let copies = copy_paste(&mut editor, &names(&["Box1", "Box2"])).expect("copied");
    assert_eq!(copies, names(&["Box1_1", "Box2_1"]));
    assert_eq!(
        editor.calls().iter().map(|c| c.method.as_str()).collect::<Vec<_>>(),
        vec!["Copy", "Paste"]
    );
}

#[test]
fn test_subtract_and_unite() {
    let mut editor = editor();
    subtract(&mut editor, &names(&["a", "b"]), &names(&["c"]), true).expect("subtracted");
    unite(&mut editor, &names(&["a", "b"]), false).expect("united");

    let lines = editor.script_lines();
    assert_eq!(
        lines[0],
        concat!(
            r#"oEditor.Subtract(["NAME:Selections", "Blank Parts:=", "a,b", "Tool Parts:=", "c"], "#,
            r#"["NAME:SubtractParameters", "KeepOriginals:=", True, "TurnOnNBodyBoolean:=", True])"#
        )
    );
    assert!(lines[1].starts_with(r#"oEditor.Unite(["NAME:Selections", "Selections:=", "a,b"]"#));
}

#[test]
fn test_add_material_properties_in_order() {
    let mut definitions = RecordingSession::new("oDefinitionManager");
    let silicon = MaterialProperties::new()
        .with("permittivity", 11.45)
        .with("dielectric_loss_tangent", 0.0);
    add_material(&mut definitions, "silicon", &silicon).expect("added");

    assert_eq!(
        definitions.script_lines(),
        vec![concat!(
            r#"oDefinitionManager.AddMaterial(["NAME:silicon", "CoordinateSystemType:=", "Cartesian", "#,
            r#""BulkOrSurfaceType:=", 1, ["NAME:PhysicsTypes", "set:=", ["Electromagnetic"]], "#,
            r#""permittivity:=", "11.45", "dielectric_loss_tangent:=", "0"])"#
        )]
    );
}

#[test]
fn test_conductor_colors() {
    let mut materials = MaterialTable::new();
    materials.insert("copper", MaterialProperties::new().with("conductivity", 5.8e7));

    let pec = color_by_material("pec", &materials, true);
    assert_eq!(<(i64, i64, i64, f64)>::from(pec), (240, 120, 240, 0.5));
    assert_eq!(color_by_material("copper", &materials, false), pec);
}

#[test]
fn test_dielectric_colors() {
    let mut materials = MaterialTable::new();
    materials.insert("silicon", MaterialProperties::new().with("permittivity", 11.45));

    let sheet = color_by_material("silicon", &materials, true);
    assert_eq!((sheet.red, sheet.green, sheet.blue), (60, 179, 59));
    assert_relative_eq!(sheet.transparency, 0.634_436_393_137_872_9, epsilon = 1e-12);

    let solid = color_by_material("silicon", &materials, false);
    assert_eq!((solid.red, solid.green, solid.blue), (60, 179, 59));
    assert_relative_eq!(solid.transparency, 0.796_515_155_623_465_1, epsilon = 1e-12);
}

#[test]
fn test_set_color_layout() {
    let mut editor = editor();
    let color = Color {
        red: 240,
        green: 120,
        blue: 240,
        transparency: 0.5,
    };
    set_color(&mut editor, &names(&["m_1"]), &color).expect("set");

    assert!(editor.script_lines()[0].ends_with(
        r#"["NAME:ChangedProps", ["NAME:Color", "R:=", 240, "G:=", 120, "B:=", 240], ["NAME:Transparent", "Value:=", 0.5]]]])"#
    ));
}

#[test]
fn test_scale_factor_as_text() {
    let mut editor = editor();
    scale(&mut editor, &names(&["s"]), 0.001).expect("scaled");
    assert!(editor.script_lines()[0].ends_with(
        r#"["NAME:ScaleParameters", "ScaleX:=", "0.001", "ScaleY:=", "0.001", "ScaleZ:=", "0.001"])"#
    ));
}

#[test]
fn test_match_layer_reexport() {
    assert!(match_layer("signal_1", "signal*"));
    assert!(!match_layer("signal_1", "signal"));
}
