use std::fmt;

/// Errors raised while compiling a rule specification (`compile`/`states`).
///
/// A few variants are unreachable from the safe Rust builder (the type
/// system already rules them out) but are kept so the error taxonomy
/// stays complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    EmptyMatchingPattern { rule: String },
    CaptureGroupInPattern { rule: String },
    DisallowedRegexFlag { rule: String },
    MultipleErrorRules { first: String, second: String },
    MultipleFallbackRules { first: String, second: String },
    ErrorAndFallbackCombined { error_rule: String, fallback_rule: String },
    UnescapedNewline { rule: String },
    MixedUnicodeFlag { rule: String },
    TransitionOnStatelessLexer { rule: String },
    TransitionOnFallbackRule { rule: String },
    MissingState { rule: String, state: String },
    PopNotOne { rule: String, popped: i64 },
    UnknownInclude { state: String, target: String },
    KeywordNotAString { keyword: String },
    TypeOverrideIsLiteralString { rule: String },
    ListEntryMissingType,
    IncludeAlongsideMatch { rule: String },
    IncludeNotSupportedInStatelessSpec { target: String },
    Regex { rule: String, source: regex::Error },
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::EmptyMatchingPattern { rule } => {
                write!(f, "rule `{}` may match the empty string", rule)
            }
            SpecError::CaptureGroupInPattern { rule } => {
                write!(f, "rule `{}` contains a capturing group; use (?:...)", rule)
            }
            SpecError::DisallowedRegexFlag { rule } => {
                write!(f, "rule `{}` carries a disallowed regex flag (g/y/i/m)", rule)
            }
            SpecError::MultipleErrorRules { first, second } => write!(
                f,
                "only one rule may be `error`; both `{}` and `{}` are",
                first, second
            ),
            SpecError::MultipleFallbackRules { first, second } => write!(
                f,
                "only one rule may be `fallback`; both `{}` and `{}` are",
                first, second
            ),
            SpecError::ErrorAndFallbackCombined { error_rule, fallback_rule } => write!(
                f,
                "`{}` is `error` and `{}` is `fallback`; a state may not have both",
                error_rule, fallback_rule
            ),
            SpecError::UnescapedNewline { rule } => write!(
                f,
                "rule `{}` may match a newline but does not declare lineBreaks",
                rule
            ),
            SpecError::MixedUnicodeFlag { rule } => write!(
                f,
                "rule `{}` disagrees with other rules about the unicode flag",
                rule
            ),
            SpecError::TransitionOnStatelessLexer { rule } => write!(
                f,
                "rule `{}` declares a state transition but the lexer is stateless",
                rule
            ),
            SpecError::TransitionOnFallbackRule { rule } => write!(
                f,
                "rule `{}` is `fallback` and may not also transition state",
                rule
            ),
            SpecError::MissingState { rule, state } => write!(
                f,
                "rule `{}` transitions to unknown state `{}`",
                rule, state
            ),
            SpecError::PopNotOne { rule, popped } => write!(
                f,
                "rule `{}` pops {} states; only pop: 1 is supported",
                rule, popped
            ),
            SpecError::UnknownInclude { state, target } => write!(
                f,
                "state `{}` includes unknown state `{}`",
                state, target
            ),
            SpecError::KeywordNotAString { keyword } => {
                write!(f, "keyword `{}` is not a string literal", keyword)
            }
            SpecError::TypeOverrideIsLiteralString { rule } => write!(
                f,
                "rule `{}`'s type override must be a function, not a literal string",
                rule
            ),
            SpecError::ListEntryMissingType => write!(f, "list entry is missing a `type`"),
            SpecError::IncludeAlongsideMatch { rule } => write!(
                f,
                "rule `{}` combines `include` with match alternatives",
                rule
            ),
            SpecError::IncludeNotSupportedInStatelessSpec { target } => write!(
                f,
                "`include: {}` is only meaningful in a stateful spec",
                target
            ),
            SpecError::Regex { rule, source } => {
                write!(f, "rule `{}` has an invalid pattern: {}", rule, source)
            }
        }
    }
}

impl std::error::Error for SpecError {}

impl SpecError {
    pub fn regex(rule: impl Into<String>, source: regex::Error) -> Self {
        SpecError::Regex { rule: rule.into(), source }
    }
}

/// A runtime syntax failure, carrying the fully rendered multi-line
/// diagnostic produced by `format_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Renders a diagnostic with up to two lines of context before and after
/// the target line, with a caret under the column.
pub fn format_error(buffer: &str, line: usize, column: usize, message: &str) -> String {
    let lines: Vec<&str> = buffer.split('\n').collect();
    let total = lines.len();
    let start = line.saturating_sub(2).max(1);
    let end = (line + 2).min(total);

    let mut out = format!("{} at line {} col {}:\n\n", message, line, column);
    let mut caret_indent = 0usize;

    for n in start..=end {
        let content = lines.get(n - 1).copied().unwrap_or("");
        let prefix = format!("{}  ", n);
        if n == line {
            caret_indent = prefix.chars().count();
        }
        out.push_str(&prefix);
        out.push_str(content);
        out.push('\n');
    }

    out.push_str(&" ".repeat(caret_indent + column.saturating_sub(1)));
    out.push('^');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_places_caret_under_column() {
        let rendered = format_error("let x = 1\nlet y = @\n", 2, 9, "invalid syntax");
        let caret_line = rendered.lines().last().unwrap();
        assert_eq!(caret_line.trim_start().len(), 1);
        assert!(rendered.contains("invalid syntax at line 2 col 9:"));
        assert!(rendered.contains("1  let x = 1"));
        assert!(rendered.contains("2  let y = @"));
    }

    #[test]
    fn format_error_clamps_context_window() {
        let rendered = format_error("only one line", 1, 1, "bad");
        assert!(rendered.contains("1  only one line"));
    }
}
