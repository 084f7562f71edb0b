//! Media directory: where uploads land and converted JPEGs are written.

mod storage;

pub use storage::{MediaStore, StoredFile};
