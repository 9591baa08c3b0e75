//! Services behind the handlers: CRUD execution, the write pipeline, uploads and export.

mod crud;
pub mod export;
pub mod upload;
pub mod phone;
pub mod slug;
pub mod storage;
mod validation;
mod write;

pub use crud::{resolve_includes, CrudService};
pub use export::{export_filename, rows_to_csv};
pub use upload::{inspect_image, ImageInfo};
pub use phone::{format_phone, normalize_phone};
pub use slug::{next_free_slug, slugify};
pub use storage::{build_store, LocalStore, S3Store, UploadStore};
pub use validation::{RequestValidator, WriteMode};
pub use write::{fillable_only, WriteService};
