use std::collections::HashMap;
use std::sync::Arc;

use value_pairs::{
    MacroId, MacroRegistry, Message, MsgValueHandle, Template, TemplateCompileError,
    TemplateCompiler, TemplateOptions, TypeHint, ValueHandleAllocator,
};

/// A log message as a flat list of dynamic name-value pairs.
pub struct FakeMessage {
    pub nv: Vec<(&'static str, &'static [u8], bool)>,
    pub values: HashMap<u32, &'static [u8]>,
}

impl FakeMessage {
    pub fn new(nv: Vec<(&'static str, &'static [u8], bool)>) -> Self {
        Self {
            nv,
            values: HashMap::new(),
        }
    }
}

impl Message for FakeMessage {
    fn foreach_nv(&self, f: &mut dyn FnMut(&str, &[u8], bool)) {
        for (name, value, is_sdata) in &self.nv {
            f(name, value, *is_sdata);
        }
    }

    fn get_value(&self, handle: MsgValueHandle) -> Option<&[u8]> {
        self.values.get(&handle.0).copied()
    }
}

/// Resolves a small, fixed set of built-in macro names; everything else
/// falls through to a message-value handle.
pub struct FakeRegistry {
    pub known: &'static [&'static str],
    pub renders: HashMap<&'static str, &'static str>,
}

impl FakeRegistry {
    pub fn new(known: &'static [&'static str]) -> Self {
        Self {
            known,
            renders: HashMap::new(),
        }
    }
}

impl MacroRegistry for FakeRegistry {
    fn lookup(&self, name: &str) -> Option<MacroId> {
        self.known
            .iter()
            .position(|n| *n == name)
            .map(|i| MacroId(i as u32 + 1))
    }

    fn expand(
        &self,
        id: MacroId,
        _msg: &dyn Message,
        _opts: &TemplateOptions,
        _seq_num: u64,
        out: &mut String,
    ) {
        if let Some(name) = self.known.get(id.0 as usize - 1) {
            if let Some(rendered) = self.renders.get(name) {
                out.push_str(rendered);
            }
        }
    }
}

#[derive(Default)]
pub struct FakeAllocator {
    next: u32,
}

impl ValueHandleAllocator for FakeAllocator {
    fn handle_for(&mut self, _name: &str) -> MsgValueHandle {
        self.next += 1;
        MsgValueHandle(self.next)
    }

    fn is_sdata(&self, _handle: MsgValueHandle) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct LiteralTemplate {
    value: String,
    hint: TypeHint,
}

impl Template for LiteralTemplate {
    fn render(&self, _msg: &dyn Message, _opts: &TemplateOptions, _seq_num: u64, out: &mut String) {
        out.push_str(&self.value);
    }

    fn type_hint(&self) -> TypeHint {
        self.hint
    }
}

/// Compiles every template as a literal string (no macro substitution),
/// which is all these tests need.
pub struct LiteralCompiler;

impl TemplateCompiler for LiteralCompiler {
    fn compile(
        &self,
        template_str: &str,
        type_hint: Option<&str>,
    ) -> Result<Arc<dyn Template>, TemplateCompileError> {
        let hint = match type_hint {
            Some(tag) => TypeHint::parse(tag)
                .ok_or_else(|| TemplateCompileError::InvalidTypeHint(tag.to_string()))?,
            None => TypeHint::String,
        };
        Ok(Arc::new(LiteralTemplate {
            value: template_str.to_string(),
            hint,
        }))
    }
}
