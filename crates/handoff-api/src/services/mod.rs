pub mod session_lifecycle;

pub use session_lifecycle::{ScanUpload, SessionService};
