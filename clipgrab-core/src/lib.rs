pub mod core;
pub mod error;
pub mod fs_paths;
pub mod models;
pub mod platforms;

pub use crate::core::pipeline::Pipeline;
pub use crate::core::registry::PlatformRegistry;
pub use crate::error::ResolveError;
