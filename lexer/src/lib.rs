mod compile;
mod error;
mod keywords;
mod normalize;
mod pattern;
mod rule;
mod states;
mod tokenizer;

pub use crate::error::{format_error, SpecError, SyntaxError};
pub use crate::keywords::{keyword, keywords};
pub use crate::normalize::{normalize_flat, PatternItem, RuleEntry, RuleInput, RuleSpec};
pub use crate::pattern::Alternative;
pub use crate::rule::{error, fallback, RuleDef, RuleOption, Transition};
pub use crate::states::{StateMap, StatesInput};
pub use crate::tokenizer::{Snapshot, Token, Tokenizer};

use std::rc::Rc;

/// Compiles a single, stateless rule spec into a `Tokenizer`. Rejects any
/// `include` entry — there is nothing for a stateless spec to include from.
pub fn compile(spec: RuleSpec) -> Result<Tokenizer, SpecError> {
    let rules = normalize::normalize_flat(spec)?;
    let compiled = Rc::new(compile::compile_state(rules, false)?);
    let mut states = std::collections::HashMap::new();
    states.insert("start".to_string(), compiled);
    Ok(Tokenizer::new(Rc::new(states), "start".to_string()))
}

/// Compiles a named set of states, resolving `include`/`$all`, into a
/// `Tokenizer` starting in the declared (or first) state.
pub fn states(input: StatesInput) -> Result<Tokenizer, SpecError> {
    let (map, start) = states::build(input)?;
    Ok(Tokenizer::new(Rc::new(map), start))
}

/// Re-exports the common entry points. `compile` and `states` stay
/// top-level functions (`lexer::compile(...)`, `lexer::states(...)`)
/// rather than living under `prelude`, since both names also label
/// internal modules and a `use` of the pair here would drag those along.
pub mod prelude {
    pub use crate::error::{SpecError, SyntaxError};
    pub use crate::normalize::{RuleInput, RuleSpec};
    pub use crate::pattern::Alternative;
    pub use crate::rule::{error, fallback, RuleDef};
    pub use crate::states::StatesInput;
    pub use crate::tokenizer::{Snapshot, Token, Tokenizer};
}
