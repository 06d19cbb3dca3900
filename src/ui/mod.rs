//! Terminal front end for the feed.
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `render` - Layout and view dispatch
//! - `gallery` - Prompt list widget
//! - `status` - Status bar widget

mod gallery;
mod input;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::{run, Action};
