//! Terminal browser for a live, categorized PocketBase prompt gallery.
//!
//! The interesting part is [`feed`], which keeps a paginated view of the
//! remote collection consistent while the user switches categories, pages
//! deeper, and the server pushes change notifications.

pub mod app;
pub mod config;
pub mod feed;
pub mod remote;
pub mod ui;
pub mod util;
