mod service;

pub use service::{CreatedStagedImage, StagedImageService};
