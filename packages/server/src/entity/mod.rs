pub mod original_image;
pub mod staged_image;
