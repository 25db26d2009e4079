//! The runtime. Holds the input buffer, current offset, line/column, the
//! active state, and a state stack; implements `next`, iteration, `reset`,
//! `save`/`restore`, `clone`, and `formatError`.

use std::rc::Rc;

use common::Token as CommonToken;

use crate::error::{format_error, SyntaxError};
use crate::rule::{RuleOption, Transition};
use crate::states::StateMap;

pub type Token = CommonToken<String, String>;

const DEFAULT_MESSAGE: &str = "invalid syntax";

/// A value returned by `Tokenizer::save`, sufficient to resume tokenizing
/// from the same point given the *remaining* input. Deliberately carries
/// no offset — the caller is expected to `reset` with the unconsumed slice
/// of the original buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub line: usize,
    pub column: usize,
    pub state: String,
    pub stack: Vec<String>,
    pub queued_group: Option<usize>,
    pub queued_text: Option<String>,
    pub queued_throw: Option<String>,
}

pub struct Tokenizer {
    states: Rc<StateMap>,
    start_state: String,
    buffer: String,
    /// Character offset — the public position; offsets are byte-agnostic
    /// character indices over the buffer.
    index: usize,
    /// Byte offset into `buffer`, used only for slicing.
    byte_index: usize,
    line: usize,
    column: usize,
    state: String,
    compiled: Rc<crate::compile::CompiledState>,
    stack: Vec<String>,
    queued_group: Option<usize>,
    queued_text: Option<String>,
    queued_throw: Option<String>,
}

impl Tokenizer {
    pub(crate) fn new(states: Rc<StateMap>, start_state: String) -> Self {
        let compiled = Rc::clone(
            states.get(&start_state).expect("start state must exist in the compiled state map"),
        );
        Tokenizer {
            states,
            start_state: start_state.clone(),
            buffer: String::new(),
            index: 0,
            byte_index: 0,
            line: 1,
            column: 1,
            state: start_state,
            compiled,
            stack: Vec::new(),
            queued_group: None,
            queued_text: None,
            queued_throw: None,
        }
    }

    /// Seeds the buffer and resets runtime position. With `snapshot`,
    /// restores line/column/state/stack/queue from it instead of the
    /// fresh defaults.
    pub fn reset(&mut self, input: impl Into<String>, snapshot: Option<Snapshot>) {
        self.buffer = input.into();
        self.index = 0;
        self.byte_index = 0;
        match snapshot {
            None => {
                self.line = 1;
                self.column = 1;
                self.state = self.start_state.clone();
                self.stack.clear();
                self.queued_group = None;
                self.queued_text = None;
                self.queued_throw = None;
            }
            Some(s) => {
                self.line = s.line;
                self.column = s.column;
                self.state = s.state;
                self.stack = s.stack;
                self.queued_group = s.queued_group;
                self.queued_text = s.queued_text;
                self.queued_throw = s.queued_throw;
            }
        }
        self.compiled = Rc::clone(
            self.states.get(&self.state).expect("tokenizer state must name a compiled state"),
        );
    }

    pub fn save(&self) -> Snapshot {
        Snapshot {
            line: self.line,
            column: self.column,
            state: self.state.clone(),
            stack: self.stack.clone(),
            queued_group: self.queued_group,
            queued_text: self.queued_text.clone(),
            queued_throw: self.queued_throw.clone(),
        }
    }

    /// A fresh Tokenizer sharing the immutable compiled state map, with an
    /// empty runtime.
    pub fn clone_fresh(&self) -> Tokenizer {
        Tokenizer::new(Rc::clone(&self.states), self.start_state.clone())
    }

    pub fn set_state(&mut self, name: &str) {
        self.compiled = Rc::clone(
            self.states
                .get(name)
                .unwrap_or_else(|| panic!("unknown lexer state `{}`", name)),
        );
        self.state = name.to_string();
    }

    pub fn push_state(&mut self, name: &str) {
        self.stack.push(self.state.clone());
        self.set_state(name);
    }

    /// Popping an empty stack is a no-op: the previous state persists.
    pub fn pop_state(&mut self) {
        if let Some(previous) = self.stack.pop() {
            self.set_state(&previous);
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn offset(&self) -> usize {
        self.index
    }

    /// Reserved capability query: the simple implementation returns true
    /// unconditionally, leaving room for a real membership query later.
    pub fn has(&self, _kind: &str) -> bool {
        true
    }

    pub fn format_error(&self, token: Option<&Token>, message: &str) -> String {
        let (line, column) = match token {
            Some(t) => (t.line, t.column),
            None => (self.line, self.column),
        };
        format_error(&self.buffer, line, column, message)
    }

    fn fail(&mut self, token: Option<&Token>, message: &str) -> SyntaxError {
        let (line, column) = match token {
            Some(t) => (t.line, t.column),
            None => (self.line, self.column),
        };
        let rendered = self.format_error(token, message);
        self.kill();
        SyntaxError { message: rendered, line, column }
    }

    /// Forces subsequent calls to return the sentinel: after a runtime
    /// syntax error the tokenizer's position jumps to the end of the
    /// buffer instead of repeatedly re-raising.
    fn kill(&mut self) {
        self.byte_index = self.buffer.len();
        self.index = self.buffer.chars().count();
    }

    fn rest(&self) -> &str {
        &self.buffer[self.byte_index..]
    }

    /// Maps a capture match to its 0-based index into `compiled.groups`.
    /// Every alternative in the combined regex corresponds to exactly one
    /// compiled rule, so a successful overall match always has exactly one
    /// populated subgroup — absence would mean the combined regex and the
    /// group list have drifted apart.
    fn group_index_of(&self, caps: &regex::Captures<'_>) -> usize {
        for i in 1..caps.len() {
            if caps.get(i).is_some() {
                return i - 1;
            }
        }
        unreachable!("a successful combined-regex match always populates one subgroup")
    }

    /// Builds and returns a token for `rule` matching `text` starting at
    /// the tokenizer's current position, advancing all runtime state. If
    /// `rule.should_throw`, raises immediately instead of returning — the
    /// token is never handed back to the caller.
    fn emit(&mut self, rule: Rc<RuleOption>, text: String) -> Result<Token, SyntaxError> {
        let start_offset = self.index;
        let start_line = self.line;
        let start_column = self.column;
        let char_len = text.chars().count();

        let mut line_breaks = 0usize;
        let mut chars_after_last_newline = char_len;
        if rule.effective_line_breaks() {
            let mut consumed = 0usize;
            for ch in text.chars() {
                consumed += 1;
                if ch == '\n' {
                    line_breaks += 1;
                    chars_after_last_newline = char_len - consumed;
                }
            }
        }

        let kind = rule
            .kind_fn
            .as_ref()
            .and_then(|f| f(&text))
            .unwrap_or_else(|| rule.name.clone());
        let value = rule.value_fn.as_ref().map(|f| f(&text)).unwrap_or_else(|| text.clone());

        self.index += char_len;
        self.byte_index += text.len();
        self.line += line_breaks;
        self.column =
            if line_breaks > 0 { chars_after_last_newline + 1 } else { self.column + char_len };

        match &rule.transition {
            Some(Transition::Pop(_)) => self.pop_state(),
            Some(Transition::Push(name)) => self.push_state(&name.clone()),
            Some(Transition::Next(name)) => self.set_state(&name.clone()),
            None => {}
        }

        let token = Token {
            kind,
            value,
            text,
            offset: start_offset,
            line_breaks,
            line: start_line,
            column: start_column,
        };

        if rule.should_throw {
            return Err(self.fail(Some(&token), DEFAULT_MESSAGE));
        }

        Ok(token)
    }

    /// Returns `Ok(None)` at end of input (the "sentinel"),
    /// `Ok(Some(token))` otherwise, or `Err` on a runtime syntax failure.
    pub fn next_token(&mut self) -> Result<Option<Token>, SyntaxError> {
        // Step 1: a token queued by a previous fallback split.
        if let Some(group_index) = self.queued_group.take() {
            let text = self.queued_text.take().expect("queued_text set alongside queued_group");
            let rule = Rc::clone(&self.compiled.groups[group_index]);
            return self.emit(rule, text).map(Some);
        }

        // Step 2: a failure deferred because a fallback token had to be
        // returned first this call; nothing new was built, so the raise
        // is against the current position rather than a token.
        if let Some(message) = self.queued_throw.take() {
            return Err(self.fail(None, &message));
        }

        // Step 3: end of input.
        if self.byte_index >= self.buffer.len() {
            return Ok(None);
        }

        // Step 4: fast single-character dispatch.
        if !self.compiled.has_fallback {
            if let Some(ch) = self.rest().chars().next() {
                if let Some(rule) = self.compiled.fast.get(&ch) {
                    let rule = Rc::clone(rule);
                    return self.emit(rule, ch.to_string()).map(Some);
                }
            }
        }

        // Step 5: the combined regex. All data read from `self` is copied
        // out to owned values inside this block so the borrow ends before
        // any of the `&mut self` calls that follow it.
        enum Outcome {
            NoMatch,
            Direct { group_index: usize, text: String },
            Gap { group_index: usize, gap: String, matched_text: String },
        }

        let outcome = {
            let rest = self.rest();
            match self.compiled.combined.captures(rest) {
                None => Outcome::NoMatch,
                Some(caps) => {
                    let matched = caps.get(0).expect("group 0 always matches");
                    let group_index = self.group_index_of(&caps);
                    if !self.compiled.has_fallback || matched.start() == 0 {
                        Outcome::Direct { group_index, text: matched.as_str().to_string() }
                    } else {
                        Outcome::Gap {
                            group_index,
                            gap: rest[..matched.start()].to_string(),
                            matched_text: matched.as_str().to_string(),
                        }
                    }
                }
            }
        };

        match outcome {
            Outcome::NoMatch => {
                let rule = Rc::clone(&self.compiled.error);
                let text = self.rest().to_string();
                self.emit(rule, text).map(Some)
            }
            Outcome::Direct { group_index, text } => {
                let rule = Rc::clone(&self.compiled.groups[group_index]);
                self.emit(rule, text).map(Some)
            }
            Outcome::Gap { group_index, gap, matched_text } => {
                let rule = Rc::clone(&self.compiled.groups[group_index]);
                if rule.should_throw {
                    self.queued_throw = Some(DEFAULT_MESSAGE.to_string());
                } else {
                    self.queued_group = Some(group_index);
                    self.queued_text = Some(matched_text);
                }
                let fallback_rule = Rc::clone(&self.compiled.error);
                self.emit(fallback_rule, gap).map(Some)
            }
        }
    }
}

impl Iterator for Tokenizer {
    type Item = Result<Token, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile_state;
    use crate::normalize::{normalize_flat, RuleInput, RuleSpec};
    use crate::pattern::Alternative;
    use crate::rule::RuleDef;
    use std::collections::HashMap;

    fn single_state_tokenizer(spec: RuleSpec) -> Tokenizer {
        let rules = normalize_flat(spec).unwrap();
        let compiled = compile_state(rules, false).unwrap();
        let mut states = HashMap::new();
        states.insert("start".to_string(), Rc::new(compiled));
        Tokenizer::new(Rc::new(states), "start".to_string())
    }

    #[test]
    fn fallback_splitting() {
        let spec = RuleSpec::new()
            .rule("op", RuleInput::regex("[._]"))
            .rule("text", RuleInput::detailed(crate::rule::fallback()));
        let mut t = single_state_tokenizer(spec);
        t.reset(".this_that.", None);

        let mut kinds_values = Vec::new();
        while let Some(tok) = t.next_token().unwrap() {
            kinds_values.push((tok.kind.clone(), tok.value.clone()));
        }

        assert_eq!(
            kinds_values,
            vec![
                ("op".to_string(), ".".to_string()),
                ("text".to_string(), "this".to_string()),
                ("op".to_string(), "_".to_string()),
                ("text".to_string(), "that".to_string()),
                ("op".to_string(), ".".to_string()),
            ]
        );
    }

    #[test]
    fn fallback_across_newline_tracks_offsets() {
        let spec = RuleSpec::new()
            .rule("op", RuleInput::regex("[._]"))
            .rule("text", RuleInput::detailed(crate::rule::fallback()));
        let mut t = single_state_tokenizer(spec);
        t.reset(".this_th\nat.", None);

        let mut offsets = Vec::new();
        let mut values = Vec::new();
        while let Some(tok) = t.next_token().unwrap() {
            offsets.push(tok.offset);
            values.push(tok.value.clone());
        }

        assert_eq!(offsets, vec![0, 1, 5, 6, 11]);
        assert_eq!(values, vec![".", "this", "_", "th\nat", "."]);
    }

    #[test]
    fn literal_length_sort_within_a_rule() {
        let spec = RuleSpec::new().rule(
            "op",
            RuleInput::list(vec![
                Alternative::literal("="),
                Alternative::literal("=="),
                Alternative::literal("==="),
                Alternative::literal("+"),
                Alternative::literal("+="),
            ]),
        );
        let mut t = single_state_tokenizer(spec);
        t.reset("===+=", None);

        let first = t.next_token().unwrap().unwrap();
        assert_eq!(first.value, "===");
        let second = t.next_token().unwrap().unwrap();
        assert_eq!(second.value, "+=");
        assert_eq!(t.next_token().unwrap(), None);
    }

    #[test]
    fn should_throw_raises_and_then_sentinels() {
        let spec = RuleSpec::new().rule("digits", RuleInput::regex("[0-9]+"));
        let mut t = single_state_tokenizer(spec);
        t.reset("invalid", None);

        let err = t.next_token().unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);

        assert_eq!(t.next_token().unwrap(), None);
    }

    #[test]
    fn declared_error_rule_does_not_throw() {
        let spec = RuleSpec::new()
            .rule("digits", RuleInput::regex("[0-9]+"))
            .rule("error", RuleInput::detailed(crate::rule::error()));
        let mut t = single_state_tokenizer(spec);
        t.reset("123foo", None);

        let first = t.next_token().unwrap().unwrap();
        assert_eq!(first.kind, "digits");
        assert_eq!(first.value, "123");

        let second = t.next_token().unwrap().unwrap();
        assert_eq!(second.kind, "error");
        assert_eq!(second.value, "foo");
        assert_eq!(second.offset, 3);
    }

    #[test]
    fn keyword_reclassification() {
        let kind_fn = crate::keywords::keywords(vec![("kw", vec!["class"])]);
        let spec = RuleSpec::new().rule(
            "identifier",
            RuleInput::detailed(
                RuleDef::new().pattern(Alternative::regex("[a-zA-Z]+")).kind_fn_rc(kind_fn),
            ),
        );
        let mut t = single_state_tokenizer(spec);

        t.reset("class", None);
        assert_eq!(t.next_token().unwrap().unwrap().kind, "kw");

        t.reset("className", None);
        assert_eq!(t.next_token().unwrap().unwrap().kind, "identifier");
    }

    #[test]
    fn save_restore_round_trip() {
        let spec = RuleSpec::new()
            .rule("word", RuleInput::regex("[a-z]+"))
            .rule("ws", RuleInput::detailed(crate::rule::fallback()));
        let mut original = single_state_tokenizer(spec);
        original.reset("abc def", None);

        let _first = original.next_token().unwrap().unwrap();
        let snapshot = original.save();
        let remaining_byte = original.byte_index;
        let remaining = original.buffer[remaining_byte..].to_string();

        let rest_of_original: Vec<_> =
            std::iter::from_fn(|| original.next_token().transpose()).collect();

        let mut restored = original.clone_fresh();
        restored.reset(remaining, Some(snapshot));
        let rest_of_restored: Vec<_> =
            std::iter::from_fn(|| restored.next_token().transpose()).collect();

        let original_values: Vec<_> =
            rest_of_original.into_iter().map(|r| r.unwrap().value).collect();
        let restored_values: Vec<_> =
            rest_of_restored.into_iter().map(|r| r.unwrap().value).collect();
        assert_eq!(original_values, restored_values);
    }

    #[test]
    fn clone_isolation() {
        let spec = RuleSpec::new().rule("word", RuleInput::regex("[a-z]+"));
        let mut original = single_state_tokenizer(spec);
        original.reset("abc", None);
        let _ = original.next_token().unwrap();

        let clone = original.clone_fresh();
        assert_eq!(clone.offset(), 0);
        assert_eq!(original.offset(), 3);
    }

    #[test]
    fn popping_empty_stack_is_a_no_op() {
        let spec = RuleSpec::new().rule("word", RuleInput::regex("[a-z]+"));
        let mut t = single_state_tokenizer(spec);
        t.reset("abc", None);
        t.pop_state();
        assert_eq!(t.state(), "start");
    }

    #[test]
    fn stateful_push_pop_nesting() {
        use crate::states::{build, StatesInput};

        let main = RuleSpec::new()
            .rule("word", RuleInput::regex("\\w+"))
            .rule(
                "lparen",
                RuleInput::detailed(RuleDef::new().pattern(Alternative::literal("(")).push("inner")),
            )
            .rule("rparen", RuleInput::literal(")"));
        let inner = RuleSpec::new()
            .rule("thing", RuleInput::regex("\\w+"))
            .rule(
                "lparen",
                RuleInput::detailed(RuleDef::new().pattern(Alternative::literal("(")).push("inner")),
            )
            .rule(
                "rparen",
                RuleInput::detailed(RuleDef::new().pattern(Alternative::literal(")")).pop()),
            );

        let (states, start) = build(StatesInput::new().state("main", main).state("inner", inner)).unwrap();
        let mut t = Tokenizer::new(Rc::new(states), start);
        t.reset("a(b(c)d)e", None);

        let mut kinds = Vec::new();
        while let Some(tok) = t.next_token().unwrap() {
            kinds.push(tok.kind);
        }

        assert_eq!(
            kinds,
            vec![
                "word".to_string(),
                "lparen".to_string(),
                "thing".to_string(),
                "lparen".to_string(),
                "thing".to_string(),
                "rparen".to_string(),
                "thing".to_string(),
                "rparen".to_string(),
                "word".to_string(),
            ]
        );
    }
}
