use std::fmt;
use std::rc::Rc;

use crate::pattern::Alternative;

/// A compiled rule's state-transition mode. At most one of push/pop/next
/// may be set on a `RuleOption`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Push(String),
    /// Only `pop: 1` is meaningful; any other count is rejected by
    /// `crate::states`.
    Pop(i64),
    Next(String),
}

type KindFn = Rc<dyn Fn(&str) -> Option<String>>;
type ValueFn = Rc<dyn Fn(&str) -> String>;

/// The normalized, per-rule descriptor the normalizer produces and the
/// compiler consumes.
#[derive(Clone)]
pub struct RuleOption {
    pub name: String,
    pub patterns: Vec<Alternative>,
    pub kind_fn: Option<KindFn>,
    pub value_fn: Option<ValueFn>,
    pub line_breaks: bool,
    pub transition: Option<Transition>,
    pub error: bool,
    pub fallback: bool,
    pub should_throw: bool,
}

impl RuleOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            patterns: Vec::new(),
            kind_fn: None,
            value_fn: None,
            line_breaks: false,
            transition: None,
            error: false,
            fallback: false,
            should_throw: false,
        }
    }

    /// `lineBreaks` is implicitly true for `error`/`fallback` rules.
    pub fn effective_line_breaks(&self) -> bool {
        self.line_breaks || self.error || self.fallback
    }
}

impl fmt::Debug for RuleOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleOption")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .field("line_breaks", &self.line_breaks)
            .field("transition", &self.transition)
            .field("error", &self.error)
            .field("fallback", &self.fallback)
            .field("should_throw", &self.should_throw)
            .finish()
    }
}

/// The object-form rule body a user builds up before normalization: either
/// a bare `error`/`fallback` sentinel, or a rule with a match list plus
/// whatever overrides it needs.
#[derive(Clone)]
pub struct RuleDef {
    pub patterns: Vec<Alternative>,
    pub kind_fn: Option<KindFn>,
    pub value_fn: Option<ValueFn>,
    pub line_breaks: bool,
    pub transition: Option<Transition>,
    pub error: bool,
    pub fallback: bool,
    pub should_throw: bool,
}

impl RuleDef {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
            kind_fn: None,
            value_fn: None,
            line_breaks: false,
            transition: None,
            error: false,
            fallback: false,
            should_throw: false,
        }
    }

    pub fn pattern(mut self, alt: Alternative) -> Self {
        self.patterns.push(alt);
        self
    }

    pub fn patterns(mut self, alts: impl IntoIterator<Item = Alternative>) -> Self {
        self.patterns.extend(alts);
        self
    }

    pub fn line_breaks(mut self, value: bool) -> Self {
        self.line_breaks = value;
        self
    }

    pub fn kind_fn(mut self, f: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.kind_fn = Some(Rc::new(f));
        self
    }

    pub fn kind_fn_rc(mut self, f: KindFn) -> Self {
        self.kind_fn = Some(f);
        self
    }

    pub fn value_fn(mut self, f: impl Fn(&str) -> String + 'static) -> Self {
        self.value_fn = Some(Rc::new(f));
        self
    }

    pub fn push(mut self, state: impl Into<String>) -> Self {
        self.transition = Some(Transition::Push(state.into()));
        self
    }

    pub fn next(mut self, state: impl Into<String>) -> Self {
        self.transition = Some(Transition::Next(state.into()));
        self
    }

    pub fn pop(mut self) -> Self {
        self.transition = Some(Transition::Pop(1));
        self
    }

    pub fn pop_n(mut self, n: i64) -> Self {
        self.transition = Some(Transition::Pop(n));
        self
    }

    pub fn should_throw(mut self, value: bool) -> Self {
        self.should_throw = value;
        self
    }

    pub fn into_rule_option(self, name: impl Into<String>) -> RuleOption {
        RuleOption {
            name: name.into(),
            patterns: self.patterns,
            kind_fn: self.kind_fn,
            value_fn: self.value_fn,
            line_breaks: self.line_breaks,
            transition: self.transition,
            error: self.error,
            fallback: self.fallback,
            should_throw: self.should_throw,
        }
    }
}

impl Default for RuleDef {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for a rule body that consumes the gap between the current
/// offset and the next successful match.
pub fn fallback() -> RuleDef {
    let mut def = RuleDef::new();
    def.fallback = true;
    def.line_breaks = true;
    def
}

/// Shorthand for a rule body that consumes remaining input when no other
/// rule matches. Distinct from the *default* synthesized error rule
/// `crate::compile` builds when no rule declares `error` at all: this one
/// is user-declared and does not set `should_throw`.
pub fn error() -> RuleDef {
    let mut def = RuleDef::new();
    def.error = true;
    def.line_breaks = true;
    def
}
