use crate::{EnvError, Error, EvalError, ParseError};
use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

const SOURCE_ID: &str = "REPL";

type ReplReport = Report<'static, (&'static str, Range<usize>)>;

// Zero-width spans at the end of input still need something to point at
fn end_of(input: &str) -> Range<usize> {
    let last = input.char_indices().last().map_or(0, |(i, _)| i);
    last..input.len()
}

// Spans are byte offsets into the input line
fn config() -> Config {
    Config::default().with_index_type(IndexType::Byte)
}

fn report(config: Config, span: Range<usize>, message: String, label: String) -> ReplReport {
    Report::build(ReportKind::Error, (SOURCE_ID, span.clone()))
        .with_config(config)
        .with_message(message)
        .with_label(Label::new((SOURCE_ID, span)).with_message(label))
        .finish()
}

impl ParseError {
    fn to_report(&self, input: &str, config: Config) -> ReplReport {
        match self {
            ParseError::UnexpectedEof => report(
                config,
                end_of(input),
                "Unexpected end of input".to_string(),
                "expected ')' or another expression here".to_string(),
            ),
            ParseError::UnexpectedCloseParen(span) => report(
                config,
                span.to_range(),
                "Unexpected ')'".to_string(),
                "this ')' has no matching '('".to_string(),
            ),
            ParseError::TrailingTokens(span) => report(
                config,
                span.start..input.len(),
                "Unexpected input after the expression".to_string(),
                "only one expression is read per line".to_string(),
            ),
        }
    }
}

impl EvalError {
    // Values carry no spans, so evaluation errors point at the whole input
    fn to_report(&self, input: &str, config: Config) -> ReplReport {
        let whole = 0..input.len();
        match self {
            EvalError::EnvError(EnvError::UnboundVariable(name)) => report(
                config,
                whole,
                format!("Unbound symbol `{}`", name),
                "not defined in the current scope".to_string(),
            ),
            EvalError::EnvError(EnvError::Arity { expected, found }) => report(
                config,
                whole,
                "Wrong number of arguments".to_string(),
                format!("procedure takes {} argument(s), {} given", expected, found),
            ),
            EvalError::MalformedSpecialForm(message) => report(
                config,
                whole,
                "Malformed special form".to_string(),
                message.clone(),
            ),
            EvalError::NotAProcedure(value) => report(
                config,
                whole,
                format!("Not a procedure: {}", value),
                format!("a {} cannot be called", value.type_name()),
            ),
            EvalError::TypeMismatch { expected, found } => report(
                config,
                whole,
                "Type mismatch".to_string(),
                format!("expected {}, found {} `{}`", expected, found.type_name(), found),
            ),
            EvalError::InvalidArguments(message) => {
                report(config, whole, "Invalid arguments".to_string(), message.clone())
            }
            EvalError::DivisionByZero => report(
                config,
                whole,
                "Division by zero".to_string(),
                "a divisor evaluated to zero".to_string(),
            ),
        }
    }
}

impl Error {
    fn to_report(&self, input: &str, config: Config) -> ReplReport {
        match self {
            Error::Parse(err) => err.to_report(input, config),
            Error::Eval(err) => err.to_report(input, config),
        }
    }

    /// Writes a labelled report of this error against `input` to stderr.
    pub fn pretty_print(&self, input: &str) -> io::Result<()> {
        self.to_report(input, config())
            .eprint((SOURCE_ID, Source::from(input)))
    }

    /// Same report rendered to a string, without colors.
    pub fn render(&self, input: &str) -> io::Result<String> {
        let report = self.to_report(input, config().with_color(false));
        let mut buffer = Vec::new();
        report.write((SOURCE_ID, Source::from(input)), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;

    fn render_error(input: &str) -> String {
        let err = Interpreter::new()
            .eval_str(input)
            .expect_err("input should fail");
        err.render(input).expect("report renders")
    }

    #[test]
    fn test_unbound_report_names_symbol() {
        let text = render_error("(+ 1 missing)");
        assert!(text.contains("Unbound symbol `missing`"), "{}", text);
    }

    #[test]
    fn test_close_paren_report() {
        let text = render_error(")");
        assert!(text.contains("Unexpected ')'"), "{}", text);
    }

    #[test]
    fn test_eof_report() {
        let text = render_error("(+ 1");
        assert!(text.contains("Unexpected end of input"), "{}", text);
    }

    #[test]
    fn test_arity_report() {
        let text = render_error("((lambda (x) x))");
        assert!(text.contains("Wrong number of arguments"), "{}", text);
    }

    #[test]
    fn test_labels_survive_multibyte_input() {
        let text = render_error("(car (quote (λλλλ))) )");
        assert!(text.contains("only one expression is read per line"), "{}", text);

        let text = render_error("(+ 1 λ)");
        assert!(text.contains("not defined in the current scope"), "{}", text);

        let text = render_error("(list 1 λ");
        assert!(text.contains("expected ')' or another expression here"), "{}", text);
    }
}
