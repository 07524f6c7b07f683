//! The project-set coordinator.
//!
//! [`ProjectSet`] is the ingress for every client event of the
//! language-analysis server: file opens, edits, closes, external project
//! declarations, and filesystem watch notifications. It decides, at every
//! moment, which projects exist, which files each project owns, and when
//! each project's compilation graph must be rebuilt.
//!
//! Everything here runs on one logical thread, the host's event
//! dispatcher. Entry points take `&mut self`, never suspend internally, and
//! leave the documented invariants intact between calls. Time only advances
//! when the host calls [`ProjectSet::drain_pending`] with its clock.

mod config;
mod events;
mod presence;
mod registry;
mod service;
mod typings;

pub mod graph;

pub use config::{ConfigParser, JsonConfigParser};
pub use events::{FileExtensionCounts, ProjectInfoTelemetry, ProjectTaxonomy, ServerEvent};
pub use presence::PresenceState;
pub use registry::ScriptInfo;
pub use service::{
    ExternalProjectSpec, FileEdits, HostConfiguration, OpenFileResult, OpenRequest,
    ProjectSet, ProjectSetOptions, ProjectVersionDelta, ProjectVersionInfo, SafeListLoadError,
    CONFIG_FILE_NAMES,
};
pub use typings::{NoopTypingsInstaller, TypingsInstaller};

pub use arbor_project::{Project, ProjectKind, ProjectName};
