//! HTTP handlers for entity CRUD, checks, exports, form props and uploads.

pub mod check;
pub mod entity;
pub mod export;
pub mod form;
pub mod upload;
pub use check::check;
pub use entity::{destroy, index, show, status, store, update};
pub use export::export;
pub use form::form_props;
pub use upload::upload;
