//! The rename pipeline (§4.3): an ordered chain of key-rewrite steps,
//! grouped into sets that each apply unconditionally to every surviving key.

/// One rewrite step applied to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformStep {
    /// Drop the first `n` bytes; clamps to the empty string if `n` reaches
    /// or exceeds the key's length. Byte-oriented, matching the upstream
    /// `g_strdup(key + n)` semantics rather than a char count.
    Shift(usize),
    /// Prepend `s` verbatim.
    AddPrefix(String),
    /// If the key starts with `from`, replace that prefix with `to`;
    /// otherwise the key is left unchanged.
    ReplacePrefix { from: String, to: String },
}

impl TransformStep {
    fn apply(&self, key: String) -> String {
        match self {
            Self::Shift(n) => {
                let bytes = key.as_bytes();
                if *n >= bytes.len() {
                    String::new()
                } else {
                    String::from_utf8_lossy(&bytes[*n..]).into_owned()
                }
            }
            Self::AddPrefix(prefix) => format!("{prefix}{key}"),
            Self::ReplacePrefix { from, to } => match key.strip_prefix(from.as_str()) {
                Some(rest) => format!("{to}{rest}"),
                None => key,
            },
        }
    }
}

/// An ordered group of [`TransformStep`]s opened against one rekey context
/// (§4.6). The base key is kept only for introspection; `apply` runs the
/// steps against whatever key it's given, unconditionally (see the open
/// question recorded in the design notes).
#[derive(Debug, Clone)]
pub struct TransformSet {
    base_key: String,
    steps: Vec<TransformStep>,
}

impl TransformSet {
    pub fn new(base_key: impl Into<String>) -> Self {
        Self {
            base_key: base_key.into(),
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub fn push(&mut self, step: TransformStep) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn apply(&self, key: String) -> String {
        self.steps.iter().fold(key, |k, step| step.apply(k))
    }
}

/// The full rename pipeline: every configured [`TransformSet`], applied in
/// order, each one's steps applied in order (§4.3).
#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    sets: Vec<TransformSet>,
}

impl TransformChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, set: TransformSet) {
        self.sets.push(set);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    #[must_use]
    pub fn apply(&self, key: &str) -> String {
        self.sets
            .iter()
            .fold(key.to_string(), |k, set| set.apply(k))
    }
}
