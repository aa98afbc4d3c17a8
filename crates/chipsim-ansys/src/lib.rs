//! # chipsim Ansys
//!
//! Scripting front-end for the Ansys Electronics Desktop: builders for the
//! modeler geometry commands and the cross-section import driver.
//!
//! The desktop objects are reached through [`ScriptObject`]; calls can be
//! forwarded to a live session or captured with [`RecordingSession`].

pub mod geometry;
pub mod import;
pub mod session;
pub mod token;

pub use geometry::{
    add_layer, add_material, color_by_material, copy_paste, create_box, create_polygon,
    create_rectangle, delete, match_layer, move_vertically, scale, set_color, set_material,
    subtract, thicken_sheet, unite, Color, LayerMap, DEFAULT_LAYER_TYPE,
};
pub use import::{import_cross_section, DesignHandles, LayerObjects};
pub use session::{Call, RecordingSession, ScriptObject};
pub use token::Token;
