//! Git clone operations and source file loading.

pub mod clone;
pub mod loader;

pub use clone::{clone_repo, repo_name_from_url, set_transport_timeouts, validate_repo_url};
pub use loader::{load_documents, LoadOptions, LoadReport};
