//! Small helpers shared by the feed and the terminal adapter.
//!
//! - **Text**: width-aware truncation and stripping of terminal escapes
//!   from remote text
//! - **Links**: scheme check before handing a record's image to the browser
//! - **Tasks**: panic capture for spawned background work

mod link;
mod task;
mod text;

pub use link::{checked_image_link, LinkError};
pub use task::catch_task_panic;
pub use text::{display_width, single_line, strip_control_chars, truncate_to_width};
