//! Request extractors.

mod json;
mod list;
pub use json::JsonBody;
pub use list::{ListParams, DEFAULT_PER_PAGE, MAX_PER_PAGE};
