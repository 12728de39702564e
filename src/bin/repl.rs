use std::borrow::Cow;
use std::env;

use lilisp::environment::EnvRef;
use lilisp::evaluator::special_form_identifiers;
use lilisp::{Interpreter, TokenKind, Value, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{
    Cmd, Completer, Context, EditMode, Editor, EventHandler, KeyCode, KeyEvent, Modifiers,
};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_HISTORY: &str = "lilisp_history.txt";

/// REPL settings read from the environment.
struct ReplConfig {
    history_path: String,
    edit_mode: EditMode,
}

impl ReplConfig {
    // LILISP_HISTORY: history file; LILISP_EDIT_MODE: "vi" or "emacs"
    fn from_env() -> Self {
        let history_path =
            env::var("LILISP_HISTORY").unwrap_or_else(|_| DEFAULT_HISTORY.to_string());
        let edit_mode = match env::var("LILISP_EDIT_MODE").as_deref() {
            Ok(mode) if mode.eq_ignore_ascii_case("vi") => EditMode::Vi,
            Ok(mode) if !mode.eq_ignore_ascii_case("emacs") => {
                warn!(mode, "unknown LILISP_EDIT_MODE, using emacs");
                EditMode::Emacs
            }
            _ => EditMode::Emacs,
        };
        ReplConfig {
            history_path,
            edit_mode,
        }
    }
}

struct LispCompleter {
    env: EnvRef,
}

impl rustyline::completion::Completer for LispCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = match tokenize(&line[..pos]).pop() {
            // Only complete an atom the cursor is touching
            Some(token) if token.span.end == pos => match token.kind {
                TokenKind::Atom(prefix) => prefix,
                _ => return Ok((pos, vec![])),
            },
            _ => return Ok((pos, vec![])),
        };
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .identifiers()
            .union(&special_form_identifiers())
            .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
            .filter(|rest| !rest.is_empty())
            .collect();
        candidates.sort();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: ParenValidator,
    #[rustyline(Highlighter)]
    highlighter: ParenHighlighter,
    #[rustyline(Completer)]
    completer: LispCompleter,
}

/// Keeps reading lines while parentheses are still open.
struct ParenValidator;

impl Validator for ParenValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth = 0usize;
        for (i, c) in ctx.input().char_indices() {
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - Unmatched ')' at position {}",
                        i
                    ))));
                }
                ')' => depth -= 1,
                _ => {}
            }
        }
        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Highlights the pair of parentheses around the cursor and any stray ')'.
struct ParenHighlighter;

impl Highlighter for ParenHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let mut open: Vec<usize> = Vec::new();
        let mut highlighted = String::with_capacity(line.len());
        // Byte offsets into `highlighted` of each '(' still waiting for its match
        for (i, c) in line.char_indices() {
            match c {
                '(' => {
                    open.push(highlighted.len());
                    highlighted.push(c);
                }
                ')' => match open.pop() {
                    Some(matching_pos) if i + 1 == pos => {
                        highlighted.push_str("\x1b[1;34m)\x1b[0m");
                        highlighted.replace_range(matching_pos..=matching_pos, "\x1b[1;34m(\x1b[0m");
                    }
                    Some(_) => highlighted.push(c),
                    None => highlighted.push_str("\x1b[31m)\x1b[0m"),
                },
                _ => highlighted.push(c),
            }
        }
        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn print_result(value: &Value) {
    if !matches!(value, Value::Unspecified) {
        println!("{}", value);
    }
}

fn main() -> rustyline::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = ReplConfig::from_env();
    println!("lilisp v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let interpreter = Interpreter::new();
    let helper = InputHelper {
        validator: ParenValidator,
        highlighter: ParenHighlighter,
        completer: LispCompleter {
            env: interpreter.global().clone(),
        },
    };
    let rl_config = rustyline::config::Config::builder()
        .edit_mode(config.edit_mode)
        .build();
    let mut rl = Editor::with_config(rl_config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(&config.history_path).is_err() {
        debug!(path = %config.history_path, "no previous history");
    }

    loop {
        match rl.readline("lilisp> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }
                match interpreter.eval_str(input) {
                    Ok(value) => print_result(&value),
                    Err(err) => {
                        if err.pretty_print(input).is_err() {
                            eprintln!("Error: {}", err);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&config.history_path)
}
