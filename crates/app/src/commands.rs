use std::fmt;

use exam_core::model::AnswerValue;

/// One line of input from the test-taker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Answer(Option<AnswerValue>),
    Next,
    Previous,
    /// 1-based, as shown in the navigator.
    GoTo(usize),
    Save,
    Finish,
    Yes,
    No,
    Resume,
    StartNew,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    MissingArgument { command: &'static str },
    InvalidIndex { raw: String },
    InvalidPair { raw: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "type a command, or `help`"),
            CommandError::Unknown(word) => write!(f, "unknown command: {word}"),
            CommandError::MissingArgument { command } => write!(f, "{command} requires a value"),
            CommandError::InvalidIndex { raw } => write!(f, "invalid question number: {raw}"),
            CommandError::InvalidPair { raw } => {
                write!(f, "invalid pair `{raw}`, expected item=choice")
            }
        }
    }
}

impl std::error::Error for CommandError {}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_pairs(raw: &str) -> Result<AnswerValue, CommandError> {
    let mut pairs = Vec::new();
    for item in split_list(raw) {
        let Some((left, right)) = item.split_once('=') else {
            return Err(CommandError::InvalidPair { raw: item });
        };
        let (left, right) = (left.trim(), right.trim());
        if left.is_empty() || right.is_empty() {
            return Err(CommandError::InvalidPair { raw: item });
        }
        pairs.push((left.to_owned(), right.to_owned()));
    }
    Ok(AnswerValue::matching(pairs))
}

impl Command {
    /// Parse one input line.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for blank, unknown, or malformed commands.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let require = |command: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument { command })
            } else {
                Ok(rest)
            }
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "answer" | "a" => Ok(Self::Answer(Some(AnswerValue::single(require("answer")?)))),
            "multi" | "m" => Ok(Self::Answer(Some(AnswerValue::Multiple(split_list(
                require("multi")?,
            ))))),
            "match" => Ok(Self::Answer(Some(parse_pairs(require("match")?)?))),
            "clear" => Ok(Self::Answer(None)),
            "next" | "n" => Ok(Self::Next),
            "prev" | "p" => Ok(Self::Previous),
            "goto" | "g" => {
                let raw = require("goto")?;
                match raw.parse::<usize>() {
                    Ok(number) if number > 0 => Ok(Self::GoTo(number)),
                    _ => Err(CommandError::InvalidIndex { raw: raw.to_owned() }),
                }
            }
            "save" | "s" => Ok(Self::Save),
            "finish" => Ok(Self::Finish),
            "yes" | "y" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "resume" => Ok(Self::Resume),
            "new" => Ok(Self::StartNew),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "q" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}

pub fn print_help() {
    println!("Commands:");
    println!("  answer <text>        single choice or free text for the current question");
    println!("  multi a,b,c          multi-select (order kept)");
    println!("  match x=1,y=2        matching question");
    println!("  clear                reset the current answer");
    println!("  next | prev | goto <n>");
    println!("  save                 save progress now");
    println!("  finish               finish the exam (asks for confirmation)");
    println!("  status | help | quit");
}
