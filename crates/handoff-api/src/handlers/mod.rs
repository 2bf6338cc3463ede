pub mod downloads;
pub mod events;
pub mod pages;
pub mod results;
pub mod scan;
pub mod sessions;
