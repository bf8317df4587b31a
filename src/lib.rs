//! Panel registry and active-component tracking for the geopanes puzzle
//! workspace.

pub mod loaders;
pub mod workspace;
