//! Workspace actions module
//!
//! This module contains all workspace mutation methods organized by domain:
//! - `focus`: Activation and forwarding of layout changes to the tracker
//! - `layout`: Add, open, remove and update panels
//! - `loading`: Running loaders and applying their completions

mod focus;
mod layout;
mod loading;


// All impl blocks are on Workspace, so no re-exports needed.
// The methods are available directly on the Workspace type.
