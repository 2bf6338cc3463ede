mod processor;

pub use processor::{ImageProcessor, NormalizedImage};
