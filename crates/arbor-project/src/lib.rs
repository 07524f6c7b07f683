//! Project objects for the Arbor coordinator.
//!
//! A [`Project`] is a bag of root scripts plus compiler options, in one of
//! three variants: externally declared, derived from an on-disk
//! configuration file, or inferred for otherwise-orphaned open files. The
//! variants share a header and differ only in a small tagged tail; dispatch
//! is a match on [`ProjectKind`].
//!
//! This crate also owns the two admission policies consulted at project
//! creation: the process-wide [`SizeLimit`] over non-TypeScript bytes, and
//! the [`Safelist`] that strips known third-party bundles out of external
//! project declarations.

mod model;
mod safelist;
mod size_limit;

pub use model::{Project, ProjectKind, ProjectName};
pub use safelist::{Safelist, SafelistError, SafelistOutcome};
pub use size_limit::{SizeLimit, DEFAULT_SIZE_BUDGET};
