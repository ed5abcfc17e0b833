//! duet-infrastructure: storage backends for the duet matchmaking core.

pub mod memory_profile_store;
pub mod paths;
pub mod toml_profile_store;

pub use crate::memory_profile_store::MemoryProfileStore;
pub use crate::paths::DuetPaths;
pub use crate::toml_profile_store::TomlProfileStore;
