//! The selector/merger (§4.4): evaluates a [`Projection`] against one
//! message and builds the sorted [`OutputMap`].

use std::collections::BTreeMap;
use std::sync::Arc;

use bitflags::bitflags;

use crate::glob::GlobList;
use crate::registry::{MacroRegistry, Message, Template, TemplateOptions, ValueHandleAllocator};
use crate::transform::TransformChain;
use crate::types::TypeHint;
use crate::valuespec::{TableSet, ValueKind, ValueSpec};

bitflags! {
    /// Which built-in sets a [`Projection`] pulls from. Bit values are part
    /// of the configuration surface and must never change (§3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Scope: u32 {
        const NV_PAIRS        = 0x01;
        const DOT_NV_PAIRS    = 0x02;
        const RFC3164         = 0x04;
        const RFC5424         = 0x08;
        const ALL_MACROS      = 0x10;
        const SELECTED_MACROS = 0x20;
        const SDATA           = 0x40;
        const EVERYTHING      = 0x7f;
    }
}

impl Scope {
    /// Resolve one named scope token (§6's scope name table) to its bits.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "nv-pairs" => Self::NV_PAIRS,
            "dot-nv-pairs" => Self::DOT_NV_PAIRS,
            "all-nv-pairs" => Self::NV_PAIRS | Self::DOT_NV_PAIRS,
            "rfc3164" | "core" | "base" => Self::RFC3164,
            "rfc5424" | "syslog-proto" => Self::RFC5424,
            "all-macros" => Self::ALL_MACROS,
            "selected-macros" => Self::SELECTED_MACROS,
            "sdata" => Self::SDATA,
            "everything" => Self::EVERYTHING,
            _ => return None,
        })
    }
}

/// One explicit `name = template` pair (§3, §4.6).
#[derive(Debug, Clone)]
pub struct ExplicitPair {
    pub name: String,
    pub template: Arc<dyn Template>,
}

/// A value plus the type tag a serializer should encode it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintedValue {
    pub type_hint: TypeHint,
    pub value: String,
}

/// The sorted output of one evaluation. Ascending order is the flat
/// consumer's view; the walker reads it in reverse (§4.4, §4.5).
#[derive(Debug, Clone, Default)]
pub struct OutputMap {
    entries: BTreeMap<String, HintedValue>,
}

impl OutputMap {
    fn insert(&mut self, key: String, value: HintedValue) {
        // Last writer for a given key wins (§8 invariant 1); empty values
        // are filtered out by callers before this ever runs (invariant 2).
        self.entries.insert(key, value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&HintedValue> {
        self.entries.get(key)
    }

    pub fn iter_ascending(&self) -> impl DoubleEndedIterator<Item = (&str, &HintedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Descending lexicographic order, as consumed by [`crate::walker::walk`].
    pub fn iter_descending(&self) -> impl Iterator<Item = (&str, &HintedValue)> {
        self.entries.iter().rev().map(|(k, v)| (k.as_str(), v))
    }
}

/// A configured selector/merger/rename pipeline. Cheap to clone; typically
/// shared downstream behind an `Arc` once built (§3).
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub(crate) scope: Scope,
    pub(crate) patterns: GlobList,
    pub(crate) explicit_pairs: Vec<ExplicitPair>,
    pub(crate) transforms: TransformChain,
}

impl Projection {
    #[must_use]
    pub fn builder() -> crate::builder::Builder {
        crate::builder::Builder::new()
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Evaluate this projection against one message, producing the sorted
    /// output map (§4.4). Evaluation is infallible and idempotent: it may be
    /// called any number of times for a given message without side effects
    /// (§8 invariant... no hidden state survives a call beyond the one-shot
    /// table init).
    #[must_use]
    pub fn evaluate(
        &self,
        msg: &dyn Message,
        registry: &dyn MacroRegistry,
        alloc: &mut dyn ValueHandleAllocator,
        opts: &TemplateOptions,
        seq_num: u64,
    ) -> OutputMap {
        let mut out = OutputMap::default();

        let nv_scope_active = self.scope.intersects(
            Scope::NV_PAIRS | Scope::DOT_NV_PAIRS | Scope::SDATA | Scope::RFC5424,
        );
        if nv_scope_active || !self.patterns.is_empty() {
            self.merge_message_nv(msg, &mut out);
        }

        let needs_tables = !self.patterns.is_empty()
            || self.scope.intersects(
                Scope::RFC3164 | Scope::RFC5424 | Scope::SELECTED_MACROS | Scope::ALL_MACROS,
            );
        let tables = needs_tables.then(|| crate::valuespec::tables(registry, alloc));

        if let Some(tables) = tables {
            if !self.patterns.is_empty() {
                // Bare glob patterns may pull a macro in even without an
                // explicit scope bit (seed = false: patterns must opt in).
                self.merge_other_set(&tables.all_macros, msg, registry, opts, seq_num, false, &mut out);
            }
            self.merge_scoped_tables(tables, msg, registry, opts, seq_num, &mut out);
        }

        self.merge_explicit_pairs(msg, opts, seq_num, &mut out);

        out
    }

    fn merge_scoped_tables(
        &self,
        tables: &'static TableSet,
        msg: &dyn Message,
        registry: &dyn MacroRegistry,
        opts: &TemplateOptions,
        seq_num: u64,
        out: &mut OutputMap,
    ) {
        // Scope-driven merges seed = true: patterns here can only exclude.
        if self.scope.intersects(Scope::RFC3164 | Scope::RFC5424 | Scope::SELECTED_MACROS) {
            self.merge_other_set(&tables.rfc3164, msg, registry, opts, seq_num, true, out);
        }
        if self.scope.contains(Scope::RFC5424) {
            self.merge_other_set(&tables.rfc5424, msg, registry, opts, seq_num, true, out);
        }
        if self.scope.contains(Scope::SELECTED_MACROS) {
            self.merge_other_set(&tables.selected_macros, msg, registry, opts, seq_num, true, out);
        }
        if self.scope.contains(Scope::ALL_MACROS) {
            self.merge_other_set(&tables.all_macros, msg, registry, opts, seq_num, true, out);
        }
    }

    fn merge_message_nv(&self, msg: &dyn Message, out: &mut OutputMap) {
        let scope = self.scope;
        let patterns = &self.patterns;
        let transforms = &self.transforms;
        msg.foreach_nv(&mut |name, value, is_sdata| {
            if value.is_empty() {
                return;
            }
            let dotted = name.starts_with('.');
            let seed = (dotted && scope.contains(Scope::DOT_NV_PAIRS))
                || (!dotted && scope.contains(Scope::NV_PAIRS))
                || (is_sdata && scope.intersects(Scope::SDATA | Scope::RFC5424));
            if !patterns.eval(name, seed) {
                return;
            }
            let key = transforms.apply(name);
            let rendered = String::from_utf8_lossy(value).into_owned();
            out.insert(
                key,
                HintedValue {
                    type_hint: TypeHint::String,
                    value: rendered,
                },
            );
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_other_set(
        &self,
        set: &[ValueSpec],
        msg: &dyn Message,
        registry: &dyn MacroRegistry,
        opts: &TemplateOptions,
        seq_num: u64,
        pattern_seed: bool,
        out: &mut OutputMap,
    ) {
        for spec in set {
            if !self.patterns.eval(spec.name, pattern_seed) {
                continue;
            }
            let mut rendered = String::new();
            match spec.kind {
                ValueKind::Macro(id) => registry.expand(id, msg, opts, seq_num, &mut rendered),
                ValueKind::MsgValue(handle) => {
                    if let Some(bytes) = msg.get_value(handle) {
                        rendered.push_str(&String::from_utf8_lossy(bytes));
                    }
                }
            }
            if rendered.is_empty() {
                continue;
            }
            let key = self.transforms.apply(spec.name);
            out.insert(
                key,
                HintedValue {
                    type_hint: TypeHint::String,
                    value: rendered,
                },
            );
        }
    }

    fn merge_explicit_pairs(
        &self,
        msg: &dyn Message,
        opts: &TemplateOptions,
        seq_num: u64,
        out: &mut OutputMap,
    ) {
        for pair in &self.explicit_pairs {
            let mut rendered = String::new();
            pair.template.render(msg, opts, seq_num, &mut rendered);
            if rendered.is_empty() {
                continue;
            }
            let key = self.transforms.apply(&pair.name);
            out.insert(
                key,
                HintedValue {
                    type_hint: pair.template.type_hint(),
                    value: rendered,
                },
            );
        }
    }

    /// Render every surviving `name=value` pair into one space-separated
    /// string, for attaching to a log line as debug context.
    #[must_use]
    pub fn debug_string(
        &self,
        msg: &dyn Message,
        registry: &dyn MacroRegistry,
        alloc: &mut dyn ValueHandleAllocator,
        opts: &TemplateOptions,
        seq_num: u64,
    ) -> String {
        let map = self.evaluate(msg, registry, alloc, opts, seq_num);
        let mut text = String::new();
        for (name, value) in map.iter_ascending() {
            text.push_str(name);
            text.push('=');
            text.push_str(&value.value);
            text.push(' ');
        }
        text
    }

    /// Evaluate and invoke `f` for each surviving key in ascending
    /// lexicographic order. `f`'s return is ANDed into the overall result;
    /// once it returns `false` no further callbacks are made (§4.4, §9).
    pub fn foreach_sorted(
        &self,
        msg: &dyn Message,
        registry: &dyn MacroRegistry,
        alloc: &mut dyn ValueHandleAllocator,
        opts: &TemplateOptions,
        seq_num: u64,
        mut f: impl FnMut(&str, &HintedValue) -> bool,
    ) -> bool {
        let map = self.evaluate(msg, registry, alloc, opts, seq_num);
        let mut success = true;
        for (key, value) in map.iter_ascending() {
            let ok = f(key, value);
            success &= ok;
            if !ok {
                break;
            }
        }
        success
    }
}
