//! Resolves `include` splices and the `$all` universal rule set across a
//! mapping of named states, then compiles each one.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::compile::{compile_state, CompiledState};
use crate::error::SpecError;
use crate::normalize::{normalize, NormalizedEntry, RuleSpec};
use crate::rule::{RuleOption, Transition};

pub type StateMap = HashMap<String, Rc<CompiledState>>;

/// Input to `crate::states`: an ordered list of named states (order
/// determines the default start state), an optional `$all` rule set
/// merged into every state, and an optional explicit start state.
pub struct StatesInput {
    pub states: Vec<(String, RuleSpec)>,
    pub all: Option<RuleSpec>,
    pub start: Option<String>,
}

impl StatesInput {
    pub fn new() -> Self {
        Self { states: Vec::new(), all: None, start: None }
    }

    pub fn state(mut self, name: impl Into<String>, spec: RuleSpec) -> Self {
        self.states.push((name.into(), spec));
        self
    }

    pub fn all(mut self, spec: RuleSpec) -> Self {
        self.all = Some(spec);
        self
    }

    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }
}

impl Default for StatesInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Splices `include` entries in place, skipping self-includes and guarding
/// against cycles with a per-resolution visited set. Dedup is by rule
/// name, standing in for reference-identity dedup.
fn resolve_includes(
    state_name: &str,
    entries: &[NormalizedEntry],
    raw: &HashMap<String, Vec<NormalizedEntry>>,
    visited: &mut HashSet<String>,
    seen_names: &mut HashSet<String>,
    out: &mut Vec<RuleOption>,
) -> Result<(), SpecError> {
    for entry in entries {
        match entry {
            NormalizedEntry::Rule(opt) => {
                if seen_names.insert(opt.name.clone()) {
                    out.push(opt.clone());
                }
            }
            NormalizedEntry::Include(target) => {
                if target == state_name || visited.contains(target) {
                    continue;
                }
                visited.insert(target.clone());
                let target_entries = raw.get(target).ok_or_else(|| SpecError::UnknownInclude {
                    state: state_name.to_string(),
                    target: target.clone(),
                })?;
                resolve_includes(target, target_entries, raw, visited, seen_names, out)?;
            }
        }
    }
    Ok(())
}

fn validate_targets(states: &StateMap) -> Result<(), SpecError> {
    for compiled in states.values() {
        for rule in &compiled.groups {
            match &rule.transition {
                Some(Transition::Push(target)) | Some(Transition::Next(target)) => {
                    if !states.contains_key(target) {
                        return Err(SpecError::MissingState {
                            rule: rule.name.clone(),
                            state: target.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

pub fn build(input: StatesInput) -> Result<(StateMap, String), SpecError> {
    let all_entries: Vec<NormalizedEntry> = match input.all {
        Some(spec) => normalize(spec)?,
        None => Vec::new(),
    };

    let mut raw: HashMap<String, Vec<NormalizedEntry>> = HashMap::new();
    let order: Vec<String> = input.states.iter().map(|(name, _)| name.clone()).collect();
    for (name, spec) in input.states {
        let mut entries = normalize(spec)?;
        entries.extend(all_entries.iter().cloned());
        raw.insert(name, entries);
    }

    let mut states: StateMap = HashMap::new();
    for name in &order {
        let entries = &raw[name];
        let mut resolved = Vec::new();
        let mut visited = HashSet::new();
        let mut seen_names = HashSet::new();
        resolve_includes(name, entries, &raw, &mut visited, &mut seen_names, &mut resolved)?;
        let compiled = compile_state(resolved, true)?;
        states.insert(name.clone(), Rc::new(compiled));
    }

    validate_targets(&states)?;

    let start = input.start.unwrap_or_else(|| order[0].clone());
    if !states.contains_key(&start) {
        return Err(SpecError::MissingState { rule: "<start>".to_string(), state: start });
    }

    Ok((states, start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RuleInput;
    use crate::pattern::Alternative;

    #[test]
    fn include_cycle_resolves_without_infinite_loop() {
        let a = RuleSpec::new()
            .include("b")
            .rule("word", RuleInput::regex("\\w+"));
        let b = RuleSpec::new()
            .include("a")
            .rule("space", RuleInput::regex("[ ]+"));

        let input = StatesInput::new().state("a", a).state("b", b);
        let (states, start) = build(input).unwrap();
        assert_eq!(start, "a");
        assert!(states.contains_key("a"));
        assert!(states.contains_key("b"));

        // both states carry each other's rules via the cyclic include, so
        // state "a" (the start state) can still tokenize "b"'s rules.
        let mut t = crate::tokenizer::Tokenizer::new(Rc::new(states), start);
        t.reset("word   more", None);
        let first = t.next_token().unwrap().unwrap();
        assert_eq!(first.kind, "word");
        let second = t.next_token().unwrap().unwrap();
        assert_eq!(second.kind, "space");
    }

    #[test]
    fn all_rule_set_merges_into_every_state() {
        let main = RuleSpec::new().rule("word", RuleInput::regex("\\w+"));
        let other = RuleSpec::new().rule("digit", RuleInput::regex("[0-9]+"));
        let all = RuleSpec::new().rule("ws", RuleInput::regex("[ ]+"));

        let input = StatesInput::new().state("main", main).state("other", other).all(all);
        let (states, _) = build(input).unwrap();
        assert_eq!(states["main"].groups.len(), 2);
        assert_eq!(states["other"].groups.len(), 2);
    }

    #[test]
    fn rejects_missing_push_target() {
        let main = RuleSpec::new().rule(
            "lparen",
            RuleInput::detailed(
                crate::rule::RuleDef::new().pattern(Alternative::literal("(")).push("missing"),
            ),
        );
        let input = StatesInput::new().state("main", main);
        let err = build(input).unwrap_err();
        assert!(matches!(err, SpecError::MissingState { .. }));
    }

    #[test]
    fn rejects_unknown_include_target() {
        let main = RuleSpec::new().include("nowhere");
        let input = StatesInput::new().state("main", main);
        let err = build(input).unwrap_err();
        assert!(matches!(err, SpecError::UnknownInclude { .. }));
    }

    #[test]
    fn default_start_is_first_state() {
        let a = RuleSpec::new().rule("word", RuleInput::regex("\\w+"));
        let b = RuleSpec::new().rule("digit", RuleInput::regex("[0-9]+"));
        let input = StatesInput::new().state("a", a).state("b", b);
        let (_, start) = build(input).unwrap();
        assert_eq!(start, "a");
    }
}
