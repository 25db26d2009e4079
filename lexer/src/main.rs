use clap::{crate_authors, crate_version, App, Arg};

use std::fs::File;
use std::io::Read;

use lexer::prelude::*;
use lexer::{self, keywords, RuleInput, RuleSpec};

/// A small arithmetic grammar with identifiers, numbers, strings, and two
/// keywords (`let`/`in`) — demonstrates `compile` end to end. Order matters:
/// within a rule, maximal munch already picks the longest literal; across
/// rules, first listed wins a tie.
fn grammar() -> RuleSpec {
    let keyword_kind = keywords(vec![("kw", vec!["let", "in"])]);

    RuleSpec::new()
        .rule("ws", RuleInput::detailed(RuleDef::new().pattern(Alternative::regex(r"[ \t\r\n]+")).line_breaks(true)))
        .rule(
            "string",
            RuleInput::regex(r#""(?:\\.|[^"\\])*""#),
        )
        .rule("number", RuleInput::regex(r"[0-9]+(?:\.[0-9]+)?"))
        .rule(
            "identifier",
            RuleInput::detailed(
                RuleDef::new().pattern(Alternative::regex(r"[A-Za-z_][A-Za-z0-9_]*")).kind_fn_rc(keyword_kind),
            ),
        )
        .rule(
            "op",
            RuleInput::list(vec![
                Alternative::literal("=="),
                Alternative::literal("+"),
                Alternative::literal("-"),
                Alternative::literal("*"),
                Alternative::literal("/"),
                Alternative::literal("="),
                Alternative::literal("("),
                Alternative::literal(")"),
            ]),
        )
        .rule("error", RuleInput::detailed(error()))
}

fn main() -> Result<(), Box<dyn std::error::Error + 'static>> {
    let matches = App::new("lexer")
        .version(crate_version!())
        .author(crate_authors!())
        .about("A declarative tokenizer demo")
        .arg(Arg::with_name("FILES").multiple(true).index(1).required(true))
        .get_matches();

    let mut tokenizer = lexer::compile(grammar())?;

    for path in matches.values_of("FILES").unwrap() {
        let mut file = File::open(path)?;
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;

        println!("#name \"{}\"", path);

        tokenizer.reset(buffer, None);
        loop {
            match tokenizer.next_token() {
                Ok(None) => break,
                Ok(Some(token)) => {
                    if token.kind == "ws" {
                        continue;
                    }
                    println!("#{} {} {:?}", token.line, token.kind, token.value);
                }
                Err(err) => {
                    eprintln!("{}", err.message);
                    break;
                }
            }
        }
    }

    Ok(())
}
