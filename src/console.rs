//! # Console Module
//!
//! Line commands understood by the operator console of the binary.
//! Arguments are separated by whitespace; double quotes group words.

use crate::calls::DialRequest;
use crate::error::ConsoleError;

pub const HELP: &str = "\
Commands:
  dial <+number> <person> <company>   place a call (quote names with spaces)
  hangup <call-id>                    hang up a call
  status                              modem status and port
  calls                               calls in progress
  logs [+number]                      call history, newest first
  help                                this text
  quit                                stop and exit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Dial(DialRequest),
    Hangup(String),
    Status,
    Calls,
    Logs(Option<String>),
    Help,
    Quit,
}

/// Parses one console line, `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<Command>, ConsoleError> {
    let mut args = tokenize(line)?.into_iter();
    let Some(name) = args.next() else {
        return Ok(None);
    };
    let rest: Vec<String> = args.collect();

    let command = match (name.to_lowercase().as_str(), rest.as_slice()) {
        ("dial", [to, person, company @ ..]) if !company.is_empty() => {
            Command::Dial(DialRequest {
                to: to.clone(),
                person_name: person.clone(),
                company_name: company.join(" "),
            })
        }
        ("dial", _) => return Err(ConsoleError::Usage("dial <+number> <person> <company>")),
        ("hangup", [call_id]) => Command::Hangup(call_id.clone()),
        ("hangup", _) => return Err(ConsoleError::Usage("hangup <call-id>")),
        ("status", []) => Command::Status,
        ("calls", []) => Command::Calls,
        ("logs", []) => Command::Logs(None),
        ("logs", [phone]) => Command::Logs(Some(phone.clone())),
        ("logs", _) => return Err(ConsoleError::Usage("logs [+number]")),
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => return Err(ConsoleError::Unknown(name)),
    };
    Ok(Some(command))
}

fn tokenize(line: &str) -> Result<Vec<String>, ConsoleError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if quoted {
        return Err(ConsoleError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
