mod repository;
mod service;

pub use repository::{NewOriginalImage, OriginalImageRepository, OriginalImageStats};
pub use service::{IngestOutcome, OriginalImageService, OriginalUpload};
