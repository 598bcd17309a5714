pub mod staged_status;
pub mod storage;

pub use staged_status::StagedImageStatus;
