// Infrastructure - Media Adapter
// Implements: MediaProcessor (separation subprocess, download, catalog search)

mod catalog;
mod engine;
mod separator;

pub use catalog::CatalogClient;
pub use engine::MediaEngine;
pub use separator::SubprocessSeparator;
