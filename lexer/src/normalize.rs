//! Turns a user-authored rule spec into a canonical ordered list of
//! `RuleOption`s.

use crate::error::SpecError;
use crate::pattern::Alternative;
use crate::rule::{RuleDef, RuleOption};

/// One item inside a rule entry's body: either a bare alternative, or a
/// fully detailed object-form override.
#[derive(Clone)]
pub enum PatternItem {
    Bare(Alternative),
    Detailed(RuleDef),
}

/// The body of one named rule entry. `One` is the common case (a single
/// alternative, or a single object-form rule); `Many` is the mixed
/// plain-alternatives-and-overrides case.
#[derive(Clone)]
pub enum RuleInput {
    One(PatternItem),
    Many(Vec<PatternItem>),
}

impl RuleInput {
    pub fn literal(s: impl Into<String>) -> Self {
        RuleInput::One(PatternItem::Bare(Alternative::literal(s)))
    }

    pub fn regex(s: impl Into<String>) -> Self {
        RuleInput::One(PatternItem::Bare(Alternative::regex(s)))
    }

    pub fn detailed(def: RuleDef) -> Self {
        RuleInput::One(PatternItem::Detailed(def))
    }

    pub fn list(alts: Vec<Alternative>) -> Self {
        RuleInput::Many(alts.into_iter().map(PatternItem::Bare).collect())
    }
}

/// One entry in a rule spec: either a normal named rule, or an `include`
/// reference to another state's rules (meaningful only inside `states()`).
pub enum RuleEntry {
    Rule(String, RuleInput),
    Include(String),
}

/// An ordered rule specification; collapses the "ordered list" and "keyed
/// mapping" input forms a user might author into one representation.
pub struct RuleSpec(pub Vec<RuleEntry>);

impl RuleSpec {
    pub fn new() -> Self {
        RuleSpec(Vec::new())
    }

    pub fn rule(mut self, name: impl Into<String>, input: RuleInput) -> Self {
        self.0.push(RuleEntry::Rule(name.into(), input));
        self
    }

    pub fn include(mut self, state: impl Into<String>) -> Self {
        self.0.push(RuleEntry::Include(state.into()));
        self
    }
}

impl Default for RuleSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts a rule's alternatives so regexes precede literals and, among
/// literals, longer ones precede shorter ones (maximal munch within one
/// rule). Never reorders across rules. Stable, so relative order among
/// equal-priority alternatives is preserved.
fn sort_alternatives(alts: &mut [Alternative]) {
    alts.sort_by(|a, b| {
        use std::cmp::Ordering;
        match (a.literal_len(), b.literal_len()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(la), Some(lb)) => lb.cmp(&la),
        }
    });
}

/// Normalizes one rule entry's body into one or more `RuleOption`s,
/// expanding mixed plain/object content in encounter order: consecutive
/// plain alternatives aggregate into one rule, flushed whenever an
/// object-form override is reached.
fn normalize_input(name: &str, input: RuleInput) -> Result<Vec<RuleOption>, SpecError> {
    match input {
        RuleInput::One(PatternItem::Bare(alt)) => {
            let mut patterns = vec![alt];
            sort_alternatives(&mut patterns);
            let mut opt = RuleOption::new(name);
            opt.patterns = patterns;
            Ok(vec![opt])
        }
        RuleInput::One(PatternItem::Detailed(def)) => {
            let mut opt = def.into_rule_option(name);
            sort_alternatives(&mut opt.patterns);
            Ok(vec![opt])
        }
        RuleInput::Many(items) => {
            let mut out = Vec::new();
            let mut bare_buffer: Vec<Alternative> = Vec::new();

            let flush = |buffer: &mut Vec<Alternative>, out: &mut Vec<RuleOption>| {
                if buffer.is_empty() {
                    return;
                }
                let mut patterns = std::mem::take(buffer);
                sort_alternatives(&mut patterns);
                let mut opt = RuleOption::new(name);
                opt.patterns = patterns;
                out.push(opt);
            };

            for item in items {
                match item {
                    PatternItem::Bare(alt) => bare_buffer.push(alt),
                    PatternItem::Detailed(def) => {
                        flush(&mut bare_buffer, &mut out);
                        let mut opt = def.into_rule_option(name);
                        sort_alternatives(&mut opt.patterns);
                        out.push(opt);
                    }
                }
            }
            flush(&mut bare_buffer, &mut out);

            Ok(out)
        }
    }
}

/// Normalized output: the ordered `RuleOption` list plus any `include`
/// markers (which only `crate::states` acts on; `crate::compile` rejects
/// them outright, since a stateless spec has nothing to include from).
#[derive(Clone)]
pub enum NormalizedEntry {
    Rule(RuleOption),
    Include(String),
}

pub fn normalize(spec: RuleSpec) -> Result<Vec<NormalizedEntry>, SpecError> {
    let mut out = Vec::new();
    for entry in spec.0 {
        match entry {
            RuleEntry::Include(target) => out.push(NormalizedEntry::Include(target)),
            RuleEntry::Rule(name, input) => {
                for opt in normalize_input(&name, input)? {
                    out.push(NormalizedEntry::Rule(opt));
                }
            }
        }
    }
    Ok(out)
}

/// Normalizes a spec that must not contain any `include` (the stateless
/// `compile()` entry point); `include` only makes sense across states.
pub fn normalize_flat(spec: RuleSpec) -> Result<Vec<RuleOption>, SpecError> {
    let mut out = Vec::new();
    for entry in normalize(spec)? {
        match entry {
            NormalizedEntry::Rule(opt) => out.push(opt),
            NormalizedEntry::Include(target) => {
                return Err(SpecError::IncludeNotSupportedInStatelessSpec { target })
            }
        }
    }
    Ok(out)
}
