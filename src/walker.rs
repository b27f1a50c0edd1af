//! The SAX-style hierarchical emitter (§4.5): re-reads an [`OutputMap`] in
//! reverse order and turns its dotted keys into balanced container
//! open/value/close events.

use crate::projection::OutputMap;
use crate::types::TypeHint;

/// Receives start/value/end callbacks as the walker descends the key tree.
///
/// `FrameState` is the opaque per-container slot from the design notes: in
/// place of a raw `gpointer` threaded through `obj_start`/`obj_end`, it's a
/// type parameter the walker owns and hands back by reference to whichever
/// callback is working inside that container.
///
/// Only [`Visitor::process_value`]'s return value feeds the overall result
/// and can halt the walk early; `obj_start`/`obj_end` always run in full so
/// that every opened container gets a matching close (§8 property 5).
pub trait Visitor {
    type FrameState: Default;

    /// A new container is being opened. `key` is this container's own path
    /// segment, `prefix` its full dotted path. `parent` is `None` at the
    /// root.
    fn obj_start(
        &mut self,
        key: &str,
        prefix: &str,
        data: &mut Self::FrameState,
        parent: Option<(&str, &Self::FrameState)>,
    );

    /// A container is being closed, after all of its descendants have been
    /// emitted.
    fn obj_end(
        &mut self,
        key: &str,
        prefix: &str,
        data: &mut Self::FrameState,
        parent: Option<(&str, &Self::FrameState)>,
    );

    /// A leaf value under the current top-of-stack container. `container`
    /// is `None` if the value sits at the root with no enclosing container.
    fn process_value(
        &mut self,
        key: &str,
        container: Option<(&str, &mut Self::FrameState)>,
        type_hint: TypeHint,
        value: &str,
    ) -> bool;
}

struct Frame<T> {
    key: String,
    prefix: String,
    data: T,
}

/// Tokenize a (transformed) key into its dotted path segments, honoring the
/// RFC 5424 enterprise-id lexical rule: once a `@` is seen, consecutive
/// `[0-9]+` runs separated by single `.`s are swallowed into the same
/// segment, so `foo@1.2.3.bar` tokenizes as `[foo@1.2.3, bar]` while
/// `foo@1.bar` stops the enterprise-id run at `foo@1` because `bar` isn't
/// numeric (§4.5 step 2, verified against the enterprise-id skip routine).
#[must_use]
pub fn tokenize(name: &str) -> Vec<String> {
    let bytes = name.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                tokens.push(name[start..i].to_string());
                i += 1;
                start = i;
            }
            b'@' => {
                i += 1;
                loop {
                    let digit_start = i;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                    if i == digit_start {
                        break;
                    }
                    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                        i += 1;
                        continue;
                    }
                    break;
                }
            }
            _ => i += 1,
        }
    }
    tokens.push(name[start..].to_string());
    tokens
}

fn is_ancestor_prefix(prefix: &str, name: &str) -> bool {
    if !name.starts_with(prefix) {
        return false;
    }
    // An exact match keeps the container open too: a flat key can coincide
    // with an already-open container's prefix (e.g. "a.b" alongside
    // "a.b.c"), and that value nests inside it rather than closing it first.
    name.len() == prefix.len() || name.as_bytes()[prefix.len()] == b'.'
}

fn unwind_until<V: Visitor>(
    stack: &mut Vec<Frame<V::FrameState>>,
    visitor: &mut V,
    name: Option<&str>,
) {
    while let Some(top) = stack.last() {
        if let Some(name) = name {
            if is_ancestor_prefix(&top.prefix, name) {
                break;
            }
        }
        let mut popped = stack.pop().expect("checked by while-let");
        let parent = stack.last().map(|f| (f.prefix.as_str(), &f.data));
        visitor.obj_end(&popped.key, &popped.prefix, &mut popped.data, parent);
    }
}

fn open_containers<V: Visitor>(
    stack: &mut Vec<Frame<V::FrameState>>,
    visitor: &mut V,
    tokens: &[String],
) {
    let start = stack.len();
    let end = tokens.len().saturating_sub(1);
    for i in start..end {
        let prefix = tokens[..=i].join(".");
        let key = tokens[i].clone();
        let mut data = V::FrameState::default();
        let parent = stack.last().map(|f| (f.prefix.as_str(), &f.data));
        visitor.obj_start(&key, &prefix, &mut data, parent);
        stack.push(Frame { key, prefix, data });
    }
}

/// Walk `map` in reverse lexicographic order, emitting balanced
/// container-open/value/container-close events (§4.5). The whole walk is
/// bracketed by a root `obj_start`/`obj_end` pair carrying an empty key and
/// prefix, matching the upstream null/null bracketing pair.
pub fn walk<V: Visitor>(map: &OutputMap, visitor: &mut V) -> bool {
    let mut stack: Vec<Frame<V::FrameState>> = Vec::new();
    let mut success = true;
    let mut halted = false;
    let mut root_data = V::FrameState::default();

    visitor.obj_start("", "", &mut root_data, None);

    for (name, value) in map.iter_descending() {
        if halted {
            break;
        }
        unwind_until(&mut stack, visitor, Some(name));
        let tokens = tokenize(name);
        open_containers(&mut stack, visitor, &tokens);

        let leaf_key = tokens.last().map(String::as_str).unwrap_or("");
        let container = stack.last_mut().map(|f| (f.prefix.as_str(), &mut f.data));
        let ok = visitor.process_value(leaf_key, container, value.type_hint, &value.value);
        success &= ok;
        if !ok {
            halted = true;
        }
    }

    unwind_until(&mut stack, visitor, None);
    visitor.obj_end("", "", &mut root_data, None);
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MacroId, Message, MsgValueHandle, TemplateOptions};
    use crate::projection::{Projection, Scope};
    use crate::glob::GlobList;

    #[test]
    fn tokenize_splits_on_dots() {
        assert_eq!(tokenize("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(tokenize("solo"), vec!["solo"]);
    }

    #[test]
    fn tokenize_swallows_enterprise_id_run() {
        assert_eq!(tokenize("foo@1.2.3.bar"), vec!["foo@1.2.3", "bar"]);
    }

    #[test]
    fn tokenize_stops_enterprise_id_at_non_numeric_segment() {
        assert_eq!(tokenize("foo@1.bar"), vec!["foo@1", "bar"]);
    }

    #[test]
    fn tokenize_enterprise_id_mid_path() {
        assert_eq!(
            tokenize(".SDATA.foo@1.2.3.bar"),
            vec!["", "SDATA", "foo@1.2.3", "bar"]
        );
    }

    #[derive(Default)]
    struct Recording {
        events: Vec<String>,
    }

    #[derive(Default)]
    struct NoState;

    impl Visitor for Recording {
        type FrameState = NoState;

        fn obj_start(
            &mut self,
            key: &str,
            prefix: &str,
            _data: &mut NoState,
            _parent: Option<(&str, &NoState)>,
        ) {
            self.events.push(format!("start({key},{prefix})"));
        }

        fn obj_end(
            &mut self,
            key: &str,
            prefix: &str,
            _data: &mut NoState,
            _parent: Option<(&str, &NoState)>,
        ) {
            self.events.push(format!("end({key},{prefix})"));
        }

        fn process_value(
            &mut self,
            key: &str,
            container: Option<(&str, &mut NoState)>,
            _type_hint: TypeHint,
            value: &str,
        ) -> bool {
            let prefix = container.map(|(p, _)| p).unwrap_or("");
            self.events.push(format!("value({key},{prefix},{value})"));
            true
        }
    }

    struct FakeMessage {
        nv: Vec<(&'static str, &'static [u8], bool)>,
    }
    impl Message for FakeMessage {
        fn foreach_nv(&self, f: &mut dyn FnMut(&str, &[u8], bool)) {
            for (name, value, sdata) in &self.nv {
                f(name, value, *sdata);
            }
        }
        fn get_value(&self, _handle: MsgValueHandle) -> Option<&[u8]> {
            None
        }
    }

    struct FakeRegistry;
    impl MacroRegistry for FakeRegistry {
        fn lookup(&self, _name: &str) -> Option<MacroId> {
            None
        }
        fn expand(
            &self,
            _id: MacroId,
            _msg: &dyn Message,
            _opts: &TemplateOptions,
            _seq_num: u64,
            _out: &mut String,
        ) {
        }
    }

    struct FakeAllocator(u32);
    impl crate::registry::ValueHandleAllocator for FakeAllocator {
        fn handle_for(&mut self, _name: &str) -> MsgValueHandle {
            self.0 += 1;
            MsgValueHandle(self.0)
        }
        fn is_sdata(&self, _handle: MsgValueHandle) -> bool {
            false
        }
    }

    fn project(nv: Vec<(&'static str, &'static [u8], bool)>) -> OutputMap {
        let msg = FakeMessage { nv };
        let proj = Projection {
            scope: Scope::NV_PAIRS | Scope::DOT_NV_PAIRS,
            patterns: GlobList::new(),
            ..Default::default()
        };
        let mut alloc = FakeAllocator(0);
        proj.evaluate(&msg, &FakeRegistry, &mut alloc, &TemplateOptions::default(), 0)
    }

    #[test]
    fn balance_invariant_holds_across_nested_containers() {
        let map = project(vec![
            ("a.b.c", b"1", false),
            ("a.b.d", b"2", false),
            ("a.e", b"3", false),
            ("z", b"4", false),
        ]);
        let mut visitor = Recording::default();
        let result = walk(&map, &mut visitor);
        assert!(result);

        let starts = visitor.events.iter().filter(|e| e.starts_with("start(")).count();
        let ends = visitor.events.iter().filter(|e| e.starts_with("end(")).count();
        assert_eq!(starts, ends);
        // root bracket plus containers "a" and "a.b".
        assert_eq!(starts, 3);
    }

    #[test]
    fn halts_further_value_processing_on_failure_but_still_closes_containers() {
        let map = project(vec![("a.b", b"1", false), ("a.c", b"2", false)]);

        struct Halting {
            calls: usize,
            starts: usize,
            ends: usize,
        }
        impl Visitor for Halting {
            type FrameState = NoState;
            fn obj_start(
                &mut self,
                _key: &str,
                _prefix: &str,
                _data: &mut NoState,
                _parent: Option<(&str, &NoState)>,
            ) {
                self.starts += 1;
            }
            fn obj_end(
                &mut self,
                _key: &str,
                _prefix: &str,
                _data: &mut NoState,
                _parent: Option<(&str, &NoState)>,
            ) {
                self.ends += 1;
            }
            fn process_value(
                &mut self,
                _key: &str,
                _container: Option<(&str, &mut NoState)>,
                _type_hint: TypeHint,
                _value: &str,
            ) -> bool {
                self.calls += 1;
                false
            }
        }

        let mut visitor = Halting { calls: 0, starts: 0, ends: 0 };
        let result = walk(&map, &mut visitor);
        assert!(!result);
        assert_eq!(visitor.calls, 1);
        assert_eq!(visitor.starts, visitor.ends);
    }
}
