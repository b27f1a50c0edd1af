//! Value-pairs projection engine.
//!
//! Extracts a configured subset of a log event's name-value space, renames
//! and reshapes the surviving keys, and hands the result to a downstream
//! consumer either as a flat sorted stream ([`Projection::foreach_sorted`])
//! or as a hierarchical tree of SAX-style start/value/end events
//! ([`walker::walk`]).
//!
//! The moving parts:
//!
//! - [`glob`]: ordered include/exclude glob lists, last match wins.
//! - [`registry`]: the collaborator interfaces this crate consumes from the
//!   host (message store, macro registry, template engine).
//! - [`valuespec`]: the static built-in tables (RFC3164, RFC5424, macros).
//! - [`transform`]: the rename pipeline applied to every surviving key.
//! - [`projection`]: the selector/merger that builds the sorted output map.
//! - [`walker`]: re-reads that map and emits nested container events.
//! - [`builder`]: the programmatic and command-line-style configuration
//!   surface used to assemble a [`Projection`].

pub mod builder;
pub mod glob;
pub mod registry;
pub mod transform;
pub mod types;
pub mod valuespec;
pub mod walker;

mod projection;

pub use builder::{Builder, BuilderError};
pub use projection::{ExplicitPair, HintedValue, OutputMap, Projection, Scope};
pub use registry::{
    MacroId, MacroRegistry, Message, MsgValueHandle, Template, TemplateCompileError,
    TemplateCompiler, TemplateOptions, TimeZoneMode, ValueHandleAllocator,
};
pub use types::TypeHint;
pub use walker::Visitor;
