//! Relocation-slot redirection for one loaded ELF image.
//!
//! Hooks are recorded against a [`LibraryId`] first and only written to
//! memory by [`HookRegistry::commit`], so a missing library or symbol is
//! detected before anything irreversible happens.

mod elf;
pub mod maps;
mod registry;

pub use maps::{LibraryId, MapEntry, ProcessMaps};
pub use registry::{HookRegistry, HookState};
