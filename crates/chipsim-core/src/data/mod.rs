//! Data models shared by the solver front-ends

pub mod materials;

pub use materials::{MaterialProperties, MaterialTable, PropertyValue, PEC};
