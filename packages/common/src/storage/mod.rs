mod error;
mod hash;
mod settings;
mod traits;

pub mod filesystem;
pub mod memory;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use hash::{ContentHash, HASH_HEX_LEN};
pub use settings::S3Settings;
pub use traits::ObjectStore;
