//! Project-wide symbol and dependency model for the bsc dialect: file
//! registry, scope graph, cross-scope validation, and the editor-facing
//! queries built on top of it (spec.md §3, §4).

pub mod class_validator;
pub mod config;
pub mod dependency_graph;
pub mod descriptor_scope;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod file;
pub mod lsp_queries;
pub mod paths;
pub mod platform;
pub mod program;
#[cfg(feature = "display-diagnostics")]
pub mod render;
pub mod scope;

pub use diagnostics::{codes, DiagnosticData};
pub use error::{EngineError, ExitCode};
pub use events::{SignalBus, SubscriptionHandle};
pub use file::{Callable, CodeFile, DescriptorFile, File, FileRegistry, FileReference, ProjectFile};
pub use paths::{AbsolutePath, PkgPath};
pub use program::{Program, ProgramEvent};
pub use scope::{PlatformScope, Scope};
