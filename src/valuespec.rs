//! The static, process-wide built-in tables (§4.2): RFC3164, RFC5424, the
//! curated "selected macros" set, and the catch-all `all_macros` table used
//! when a bare glob is meant to pull a macro in.

use std::sync::OnceLock;

use tracing::debug;

use crate::registry::{MacroRegistry, ValueHandleAllocator};

/// What a [`ValueSpec`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Macro(crate::registry::MacroId),
    MsgValue(crate::registry::MsgValueHandle),
}

/// One table entry: a name plus how to render it, resolved once at first
/// use and cached for the life of the process.
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub name: &'static str,
    pub kind: ValueKind,
}

impl ValueSpec {
    fn resolve(
        name: &'static str,
        registry: &dyn MacroRegistry,
        alloc: &mut dyn ValueHandleAllocator,
    ) -> Self {
        let kind = match registry.lookup(name) {
            Some(id) => ValueKind::Macro(id),
            None => ValueKind::MsgValue(alloc.handle_for(name)),
        };
        Self { name, kind }
    }
}

/// RFC3164 header fields.
const RFC3164_NAMES: &[&str] = &[
    "FACILITY", "PRIORITY", "HOST", "PROGRAM", "PID", "MESSAGE", "DATE",
];

/// RFC5424-only addition over RFC3164.
const RFC5424_NAMES: &[&str] = &["MSGID"];

/// The curated set pulled in by `SELECTED_MACROS`.
const SELECTED_MACRO_NAMES: &[&str] = &["TAGS", "SOURCEIP", "SEQNUM"];

/// Superset consulted for `ALL_MACROS` and for bare-pattern macro merges.
const ALL_MACRO_NAMES: &[&str] = &[
    "FACILITY",
    "FACILITY_NUM",
    "PRIORITY",
    "PRI",
    "LEVEL",
    "LEVEL_NUM",
    "TAG",
    "DATE",
    "FULLDATE",
    "ISODATE",
    "STAMP",
    "YEAR",
    "MONTH",
    "DAY",
    "HOUR",
    "MIN",
    "SEC",
    "HOST",
    "PROGRAM",
    "PID",
    "MSGHDR",
    "MESSAGE",
    "MSG",
    "SOURCEIP",
    "SEQNUM",
    "TAGS",
    "MSGID",
    "CONTEXT_ID",
    "RCPTID",
    "UNIQID",
];

/// Every built-in table, resolved once and shared for the life of the
/// process.
#[derive(Debug)]
pub struct TableSet {
    pub rfc3164: Vec<ValueSpec>,
    pub rfc5424: Vec<ValueSpec>,
    pub selected_macros: Vec<ValueSpec>,
    pub all_macros: Vec<ValueSpec>,
}

fn build_table(
    names: &[&'static str],
    registry: &dyn MacroRegistry,
    alloc: &mut dyn ValueHandleAllocator,
) -> Vec<ValueSpec> {
    names
        .iter()
        .map(|n| ValueSpec::resolve(n, registry, alloc))
        .collect()
}

static TABLES: OnceLock<TableSet> = OnceLock::new();

/// Resolve (or reuse, if this process has already resolved them once) the
/// static built-in tables. Configuration happens serially before the hot
/// evaluation path runs, so a `OnceLock` is enough here — no lock is taken
/// once this has run (§9: "re-architect as a lazily-initialized static").
pub fn tables(
    registry: &dyn MacroRegistry,
    alloc: &mut dyn ValueHandleAllocator,
) -> &'static TableSet {
    TABLES.get_or_init(|| {
        debug!("resolving static value-pair tables for this process");
        TableSet {
            rfc3164: build_table(RFC3164_NAMES, registry, alloc),
            rfc5424: build_table(RFC5424_NAMES, registry, alloc),
            selected_macros: build_table(SELECTED_MACRO_NAMES, registry, alloc),
            all_macros: build_table(ALL_MACRO_NAMES, registry, alloc),
        }
    })
}
