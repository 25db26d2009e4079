//! Turns a normalized rule list into a `CompiledState` — one combined
//! regex, a fast single-character dispatch table, and the resolved
//! error/fallback rule.

use std::collections::HashMap;
use std::rc::Rc;

use regex::{Regex, RegexBuilder};

use crate::error::SpecError;
use crate::pattern::{contains_disallowed_inline_flag, Alternative};
use crate::rule::{RuleOption, Transition};

pub struct CompiledState {
    pub combined: Regex,
    pub groups: Vec<Rc<RuleOption>>,
    pub fast: HashMap<char, Rc<RuleOption>>,
    pub error: Rc<RuleOption>,
    pub has_fallback: bool,
}

fn is_single_char_literal_only(rule: &RuleOption) -> bool {
    !rule.patterns.is_empty()
        && rule
            .patterns
            .iter()
            .all(|p| matches!(p, Alternative::Literal(s) if s.chars().count() == 1))
}

/// Builds the fast single-character dispatch table. Returns an empty map
/// immediately if any rule declares `fallback`.
fn build_fast_table(rules: &[Rc<RuleOption>]) -> HashMap<char, Rc<RuleOption>> {
    let mut fast = HashMap::new();
    if rules.iter().any(|r| r.fallback) {
        return fast;
    }

    for rule in rules {
        if rule.patterns.is_empty() {
            continue;
        }
        if !is_single_char_literal_only(rule) {
            break;
        }
        for pattern in &rule.patterns {
            if let Alternative::Literal(s) = pattern {
                let ch = s.chars().next().unwrap();
                fast.entry(ch).or_insert_with(|| Rc::clone(rule));
            }
        }
    }

    fast
}

fn validate_transitions(rule: &RuleOption, has_states: bool) -> Result<(), SpecError> {
    if let Some(transition) = &rule.transition {
        if !has_states {
            return Err(SpecError::TransitionOnStatelessLexer { rule: rule.name.clone() });
        }
        if rule.fallback {
            return Err(SpecError::TransitionOnFallbackRule { rule: rule.name.clone() });
        }
        if let Transition::Pop(n) = transition {
            if *n != 1 {
                return Err(SpecError::PopNotOne { rule: rule.name.clone(), popped: *n });
            }
        }
    }
    Ok(())
}

fn select_error_rule(rules: &[Rc<RuleOption>]) -> Result<Option<Rc<RuleOption>>, SpecError> {
    let error_rules: Vec<_> = rules.iter().filter(|r| r.error).collect();
    let fallback_rules: Vec<_> = rules.iter().filter(|r| r.fallback).collect();

    if let (Some(first), Some(second)) = (error_rules.get(0), error_rules.get(1)) {
        return Err(SpecError::MultipleErrorRules {
            first: first.name.clone(),
            second: second.name.clone(),
        });
    }
    if let (Some(first), Some(second)) = (fallback_rules.get(0), fallback_rules.get(1)) {
        return Err(SpecError::MultipleFallbackRules {
            first: first.name.clone(),
            second: second.name.clone(),
        });
    }
    if let (Some(e), Some(fb)) = (error_rules.get(0), fallback_rules.get(0)) {
        return Err(SpecError::ErrorAndFallbackCombined {
            error_rule: e.name.clone(),
            fallback_rule: fb.name.clone(),
        });
    }

    if let Some(e) = error_rules.into_iter().next() {
        return Ok(Some(Rc::clone(e)));
    }
    if let Some(fb) = fallback_rules.into_iter().next() {
        return Ok(Some(Rc::clone(fb)));
    }
    Ok(None)
}

fn default_error_rule() -> RuleOption {
    let mut opt = RuleOption::new("error");
    opt.error = true;
    opt.line_breaks = true;
    opt.should_throw = true;
    opt
}

/// Validates one rule's assembled alternation body and returns its
/// non-capturing fragment.
fn validate_and_fragment(rule: &RuleOption) -> Result<String, SpecError> {
    for pattern in &rule.patterns {
        if let Alternative::Regex { source, .. } = pattern {
            if contains_disallowed_inline_flag(source) {
                return Err(SpecError::DisallowedRegexFlag { rule: rule.name.clone() });
            }
        }
    }

    let fragments: Vec<String> = rule.patterns.iter().map(Alternative::as_fragment).collect();
    let body = fragments.join("|");

    let probe = Regex::new(&body).map_err(|e| SpecError::regex(rule.name.clone(), e))?;
    if probe.is_match("") {
        return Err(SpecError::EmptyMatchingPattern { rule: rule.name.clone() });
    }
    if probe.captures_len() != 1 {
        return Err(SpecError::CaptureGroupInPattern { rule: rule.name.clone() });
    }
    if !rule.effective_line_breaks() && probe.is_match("\n") {
        return Err(SpecError::UnescapedNewline { rule: rule.name.clone() });
    }

    Ok(body)
}

fn resolve_unicode_flag(rules: &[Rc<RuleOption>], has_fallback: bool) -> Result<bool, SpecError> {
    let mut flags: Vec<(String, bool)> = Vec::new();
    for rule in rules {
        for pattern in &rule.patterns {
            if let Some(u) = pattern.unicode() {
                flags.push((rule.name.clone(), u));
            }
        }
    }
    if has_fallback || flags.is_empty() {
        return Ok(true);
    }
    let first = flags[0].1;
    if let Some((rule, _)) = flags.iter().find(|(_, u)| *u != first) {
        return Err(SpecError::MixedUnicodeFlag { rule: rule.clone() });
    }
    Ok(first)
}

/// Compiles a normalized rule list into one `CompiledState`.
pub fn compile_state(rules: Vec<RuleOption>, has_states: bool) -> Result<CompiledState, SpecError> {
    for rule in &rules {
        validate_transitions(rule, has_states)?;
    }

    let rules: Vec<Rc<RuleOption>> = rules.into_iter().map(Rc::new).collect();
    let selected = select_error_rule(&rules)?;
    let has_fallback = selected.as_ref().map(|r| r.fallback).unwrap_or(false);

    let error_rule = match selected {
        Some(rule) => rule,
        None => Rc::new(default_error_rule()),
    };

    let groups: Vec<Rc<RuleOption>> =
        rules.iter().filter(|r| !r.patterns.is_empty()).map(Rc::clone).collect();

    let unicode = resolve_unicode_flag(&groups, has_fallback)?;

    let mut rule_bodies = Vec::with_capacity(groups.len());
    for rule in &groups {
        rule_bodies.push(validate_and_fragment(rule)?);
    }

    let combined_source = if has_fallback {
        rule_bodies
            .iter()
            .map(|body| format!("({})", body))
            .collect::<Vec<_>>()
            .join("|")
    } else {
        let alternation =
            rule_bodies.iter().map(|body| format!("({})", body)).collect::<Vec<_>>().join("|");
        format!("\\A(?:{})", alternation)
    };

    let combined = RegexBuilder::new(&combined_source)
        .unicode(unicode)
        .multi_line(true)
        .dot_matches_new_line(false)
        .build()
        .map_err(|e| SpecError::regex("<combined>", e))?;

    let fast = build_fast_table(&groups);

    Ok(CompiledState { combined, groups, fast, error: error_rule, has_fallback })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Alternative;

    fn lit_rule(name: &str, lit: &str) -> RuleOption {
        let mut opt = RuleOption::new(name);
        opt.patterns = vec![Alternative::literal(lit)];
        opt
    }

    fn re_rule(name: &str, src: &str) -> RuleOption {
        let mut opt = RuleOption::new(name);
        opt.patterns = vec![Alternative::regex(src)];
        opt
    }

    #[test]
    fn fast_table_collects_single_char_literals() {
        let rules = vec![lit_rule("lparen", "("), lit_rule("rparen", ")")];
        let compiled = compile_state(rules, false).unwrap();
        assert!(compiled.fast.contains_key(&'('));
        assert!(compiled.fast.contains_key(&')'));
    }

    #[test]
    fn fast_table_disabled_after_regex_rule() {
        let rules = vec![re_rule("word", "[a-z]+"), lit_rule("lparen", "(")];
        let compiled = compile_state(rules, false).unwrap();
        assert!(compiled.fast.is_empty());
    }

    #[test]
    fn fast_table_disabled_when_fallback_present() {
        let mut fb = crate::rule::fallback().into_rule_option("text");
        fb.patterns.clear();
        let rules = vec![lit_rule("dot", "."), fb];
        let compiled = compile_state(rules, false).unwrap();
        assert!(compiled.fast.is_empty());
    }

    #[test]
    fn synthesizes_default_error_rule() {
        let rules = vec![re_rule("digits", "[0-9]+")];
        let compiled = compile_state(rules, false).unwrap();
        assert!(compiled.error.should_throw);
        assert!(compiled.error.error);
    }

    #[test]
    fn rejects_empty_matching_pattern() {
        let rules = vec![re_rule("ws", "[ \\t]*")];
        let err = compile_state(rules, false).unwrap_err();
        assert!(matches!(err, SpecError::EmptyMatchingPattern { .. }));
    }

    #[test]
    fn rejects_capture_group_in_pattern() {
        let rules = vec![re_rule("bad", "(a)(b)")];
        let err = compile_state(rules, false).unwrap_err();
        assert!(matches!(err, SpecError::CaptureGroupInPattern { .. }));
    }

    #[test]
    fn rejects_newline_match_without_line_breaks() {
        let rules = vec![re_rule("bad", "[\\s\\S]+")];
        let err = compile_state(rules, false).unwrap_err();
        assert!(matches!(err, SpecError::UnescapedNewline { .. }));
    }

    #[test]
    fn rejects_transition_on_stateless_lexer() {
        let rule = crate::rule::RuleDef::new()
            .pattern(Alternative::literal("("))
            .push("inner")
            .into_rule_option("lparen");
        let err = compile_state(vec![rule], false).unwrap_err();
        assert!(matches!(err, SpecError::TransitionOnStatelessLexer { .. }));
    }

    #[test]
    fn rejects_multiple_error_rules() {
        let mut a = crate::rule::error().into_rule_option("erra");
        a.patterns.clear();
        let mut b = crate::rule::error().into_rule_option("errb");
        b.patterns.clear();
        let err = compile_state(vec![a, b], false).unwrap_err();
        assert!(matches!(err, SpecError::MultipleErrorRules { .. }));
    }

    #[test]
    fn rejects_error_and_fallback_combined() {
        let mut e = crate::rule::error().into_rule_option("err");
        e.patterns.clear();
        let mut fb = crate::rule::fallback().into_rule_option("fb");
        fb.patterns.clear();
        let err = compile_state(vec![e, fb], false).unwrap_err();
        assert!(matches!(err, SpecError::ErrorAndFallbackCombined { .. }));
    }
}
