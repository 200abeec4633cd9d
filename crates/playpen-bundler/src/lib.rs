//! Virtual project compilation for the playpen playground.
//!
//! This crate holds the in-memory file store, the module resolver that maps
//! import specifiers onto it, and the rolldown-backed adapter that bundles a
//! project into a single ES module.

pub mod compiler;
pub mod entry;
pub mod language;
pub mod path;
pub mod plugin;
pub mod resolver;
pub mod starter;
pub mod store;
pub mod tsconfig;

pub use compiler::{BundleResult, Compile, RolldownCompiler};
pub use entry::{find_entry, ENTRY_CANDIDATES, NO_ENTRY_MESSAGE};
pub use language::Language;
pub use plugin::VirtualModulePlugin;
pub use resolver::{AliasTable, ModuleResolver, Resolution, ResolveError, DEFAULT_EXTERNALS};
pub use starter::{starter_project, STARTER_OPEN_FILE};
pub use store::{is_ignored, virtual_path_for, StoreError, VirtualFileStore};
pub use tsconfig::TsconfigError;
