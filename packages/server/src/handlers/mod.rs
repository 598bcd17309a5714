pub mod admin;
pub mod image;
