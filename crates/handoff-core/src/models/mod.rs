//! Data models for the application
//!
//! Sessions and their lifecycle enums, result artifacts, scan pages and the
//! wire messages shared by the server and its subscribers.

mod event;
mod result;
mod scan;
mod session;

pub use event::*;
pub use result::*;
pub use scan::*;
pub use session::*;
