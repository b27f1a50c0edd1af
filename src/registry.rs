//! Collaborator interfaces required from the host log-processing daemon.
//!
//! This crate only ever *consumes* these traits. Message storage, macro
//! rendering, and template compilation all live on the host side (§6); the
//! projection engine is deliberately blind to their internals.

use std::error;
use std::fmt;
use std::sync::Arc;

use crate::types::TypeHint;

/// Opaque id of a resolved built-in macro (`HOST`, `FACILITY`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacroId(pub u32);

/// Opaque handle into a message's dynamic name-value table, as allocated by
/// [`ValueHandleAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgValueHandle(pub u32);

/// Time-zone rendering mode threaded through to macro and template
/// expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneMode {
    #[default]
    Local,
    Utc,
    Send,
    Recv,
}

/// Options passed to every macro/template render call.
#[derive(Debug, Clone, Default)]
pub struct TemplateOptions {
    pub time_zone: TimeZoneMode,
    pub frac_digits: u8,
}

/// A log message's dynamic name-value space, as seen by the projection
/// engine.
pub trait Message {
    /// Enumerate every dynamic name-value pair, including SDATA. `is_sdata`
    /// tells the selector whether this pair is also eligible under the
    /// `SDATA`/`RFC5424` scopes, folding what upstream does as a separate
    /// `msg_is_handle_sdata(handle)` lookup into the enumeration itself.
    fn foreach_nv(&self, f: &mut dyn FnMut(&str, &[u8], bool));

    /// Read a previously allocated handle's value, if the message has one.
    fn get_value(&self, handle: MsgValueHandle) -> Option<&[u8]>;
}

/// Built-in macro registry: resolves macro names to ids and renders them.
pub trait MacroRegistry {
    fn lookup(&self, name: &str) -> Option<MacroId>;

    /// Render `id`'s value for `msg`, appending to `out`.
    fn expand(
        &self,
        id: MacroId,
        msg: &dyn Message,
        opts: &TemplateOptions,
        seq_num: u64,
        out: &mut String,
    );
}

/// Allocates and classifies dynamic-value handles for names that are not
/// built-in macros.
pub trait ValueHandleAllocator {
    fn handle_for(&mut self, name: &str) -> MsgValueHandle;
    fn is_sdata(&self, handle: MsgValueHandle) -> bool;
}

/// A compiled template: immutable, reusable across messages.
pub trait Template: fmt::Debug {
    fn render(&self, msg: &dyn Message, opts: &TemplateOptions, seq_num: u64, out: &mut String);
    fn type_hint(&self) -> TypeHint;
}

/// Why [`TemplateCompiler::compile`] failed (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateCompileError {
    /// The template body itself failed to parse/compile.
    Template(String),
    /// The `TYPE(...)` tag wrapping the value isn't a type this engine
    /// recognizes.
    InvalidTypeHint(String),
}

impl fmt::Display for TemplateCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(msg) => write!(f, "template compile error: {msg}"),
            Self::InvalidTypeHint(tag) => write!(f, "invalid template type hint: {tag}"),
        }
    }
}

impl error::Error for TemplateCompileError {}

/// Compiles raw template strings into [`Template`]s, optionally applying a
/// type hint tag (the `TYPE(...)` wrapper from §4.6's pair syntax).
pub trait TemplateCompiler {
    fn compile(
        &self,
        template_str: &str,
        type_hint: Option<&str>,
    ) -> Result<Arc<dyn Template>, TemplateCompileError>;
}
