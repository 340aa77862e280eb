//! Catalogs of names the project itself does not define: Python builtins,
//! well-known third-party frameworks, and the standard library.

mod builtins;
mod frameworks;
mod stdlib;

pub use builtins::BuiltinCatalog;
pub use frameworks::{FrameworkCatalog, FrameworkInfo};
pub use stdlib::{BundledStdlibProvider, StdlibCatalog, StdlibManifest, StdlibModule, StdlibProvider};
