//! Ordered include/exclude glob lists (§4.1): the `GlobPattern` list
//! component of the selector/merger.

/// One token of a compiled wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GlobToken {
    Literal(String),
    /// `?` — exactly one character.
    AnyChar,
    /// `*` — any run of characters, including none.
    AnyRun,
}

/// A compiled wildcard pattern. Grammar is the one required by §6's glob
/// engine contract: `*` matches any run, `?` matches exactly one character,
/// everything else is literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGlob {
    tokens: Vec<GlobToken>,
    source: String,
}

impl CompiledGlob {
    #[must_use]
    pub fn compile(pattern: &str) -> Self {
        let mut tokens: Vec<GlobToken> = Vec::new();
        let mut literal = String::new();
        for ch in pattern.chars() {
            match ch {
                '*' => {
                    if !literal.is_empty() {
                        tokens.push(GlobToken::Literal(std::mem::take(&mut literal)));
                    }
                    // Collapse consecutive `*` — they're equivalent to one.
                    if tokens.last() != Some(&GlobToken::AnyRun) {
                        tokens.push(GlobToken::AnyRun);
                    }
                }
                '?' => {
                    if !literal.is_empty() {
                        tokens.push(GlobToken::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(GlobToken::AnyChar);
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            tokens.push(GlobToken::Literal(literal));
        }
        Self {
            tokens,
            source: pattern.to_string(),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn matches(&self, input: &str) -> bool {
        let chars: Vec<char> = input.chars().collect();
        Self::match_tokens(&self.tokens, &chars)
    }

    fn match_tokens(tokens: &[GlobToken], input: &[char]) -> bool {
        match tokens.split_first() {
            None => input.is_empty(),
            Some((GlobToken::Literal(lit), rest)) => {
                let lit: Vec<char> = lit.chars().collect();
                input.len() >= lit.len()
                    && input[..lit.len()] == lit[..]
                    && Self::match_tokens(rest, &input[lit.len()..])
            }
            Some((GlobToken::AnyChar, rest)) => {
                !input.is_empty() && Self::match_tokens(rest, &input[1..])
            }
            Some((GlobToken::AnyRun, rest)) => {
                (0..=input.len()).any(|split| Self::match_tokens(rest, &input[split..]))
            }
        }
    }
}

/// One `(glob, include)` entry. Immutable once added (§3).
#[derive(Debug, Clone)]
pub struct GlobPattern {
    glob: CompiledGlob,
    pub include: bool,
}

impl GlobPattern {
    #[must_use]
    pub fn new(pattern: &str, include: bool) -> Self {
        Self {
            glob: CompiledGlob::compile(pattern),
            include,
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.glob.pattern()
    }
}

/// An ordered, append-only list of glob patterns. Evaluation seeds an
/// inclusion flag and lets the *last* matching pattern overwrite it (§4.1,
/// §8 property 4).
#[derive(Debug, Clone, Default)]
pub struct GlobList {
    patterns: Vec<GlobPattern>,
}

impl GlobList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pattern: &str, include: bool) {
        self.patterns.push(GlobPattern::new(pattern, include));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Evaluate inclusion of `name`, starting from `seed`. The two seed
    /// conventions used elsewhere in this crate (message-NV inclusion vs.
    /// `vp_find_in_set`'s merge-macros/merge-set modes) are the caller's
    /// responsibility to pick; this is just the shared last-match-wins
    /// machinery.
    #[must_use]
    pub fn eval(&self, name: &str, seed: bool) -> bool {
        let mut included = seed;
        for pattern in &self.patterns {
            if pattern.glob.matches(name) {
                included = pattern.include;
            }
        }
        included
    }
}
