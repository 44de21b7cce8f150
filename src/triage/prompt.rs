use std::io::{BufRead, Write};

use crate::error::BoardError;
use crate::model::field::{FieldDataType, FieldSchema};
use crate::model::item::BoardItem;
use crate::resolve::parse_number_prefix;

/// What the operator is asked about one field of one item.
pub struct PromptRequest<'r> {
    pub item: &'r BoardItem,
    pub field: &'r FieldSchema,
    /// Current value as displayed, alias included.
    pub current: String,
    /// (alias, option name) pairs configured for the field.
    pub aliases: Vec<(&'r str, &'r str)>,
}

/// Source of interactive choices. `Ok(None)` means the operator skipped.
pub trait Prompter {
    fn choose(&mut self, request: &PromptRequest<'_>) -> Result<Option<String>, BoardError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    Skip,
    Value(String),
    Invalid,
}

/// Interpret one line of operator input.
///
/// Empty, `s` and `skip` skip the field. For single-select fields the input
/// may be a 1-based option number, an option name (any case) or an alias.
/// Number fields need a leading number.
pub fn interpret_choice(input: &str, field: &FieldSchema, aliases: &[(&str, &str)]) -> Choice {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("s") || input.eq_ignore_ascii_case("skip") {
        return Choice::Skip;
    }
    match field.data_type {
        FieldDataType::SingleSelect => {}
        FieldDataType::Number if parse_number_prefix(input).is_none() => return Choice::Invalid,
        _ => return Choice::Value(input.to_string()),
    }

    if let Ok(n) = input.parse::<usize>() {
        return match n.checked_sub(1).and_then(|i| field.options.get(i)) {
            Some(option) => Choice::Value(option.name.clone()),
            None => Choice::Invalid,
        };
    }
    if let Some(option) = field
        .options
        .iter()
        .find(|o| o.name.eq_ignore_ascii_case(input))
    {
        return Choice::Value(option.name.clone());
    }
    aliases
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(input))
        .and_then(|(_, option)| field.option_by_name(option))
        .map(|o| Choice::Value(o.name.clone()))
        .unwrap_or(Choice::Invalid)
}

/// Prompts on a line-oriented reader and writer, normally stdin/stdout.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn render(&mut self, request: &PromptRequest<'_>) -> std::io::Result<()> {
        let item = request.item;
        writeln!(self.output)?;
        writeln!(self.output, "#{} {}", item.number, item.title)?;
        writeln!(
            self.output,
            "  {} (current: {})",
            request.field.name, request.current
        )?;
        for (i, option) in request.field.options.iter().enumerate() {
            let alias = request
                .aliases
                .iter()
                .find(|(_, name)| *name == option.name)
                .map(|(alias, _)| format!(" ({alias})"))
                .unwrap_or_default();
            writeln!(self.output, "  {}. {}{}", i + 1, option.name, alias)?;
        }
        write!(self.output, "  choice [s to skip]: ")?;
        self.output.flush()
    }
}

impl LinePrompter<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn choose(&mut self, request: &PromptRequest<'_>) -> Result<Option<String>, BoardError> {
        let aborted = || BoardError::PromptAborted {
            field: request.field.name.clone(),
        };
        loop {
            self.render(request).map_err(|_| aborted())?;
            let mut line = String::new();
            let read = self.input.read_line(&mut line).map_err(|_| aborted())?;
            if read == 0 {
                return Err(aborted());
            }
            match interpret_choice(&line, request.field, &request.aliases) {
                Choice::Skip => return Ok(None),
                Choice::Value(value) => return Ok(Some(value)),
                Choice::Invalid => {
                    let _ = writeln!(self.output, "  '{}' is not a valid choice", line.trim());
                }
            }
        }
    }
}
