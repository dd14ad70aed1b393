//! Interactive line commands for the terminal front end.

use crate::client::UserCommand;
use crate::correlator::{optional_input, parse_video_ids};
use crate::error::{ClientError, Result};

pub const HELP: &str = "\
commands:
  search [--category <id>] [text...]   list videos by category and/or free text
  analyze <id,id,...>                  analyze the given video entry ids
  ask <question...>                    ask about the analyzed videos
  followup <n>                         ask suggested follow-up question n
  select <n>                           show analysis result n
  status                               show connection and request state
  help                                 show this help
  quit                                 end the session";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Command(UserCommand),
    Help,
    Quit,
    Empty,
}

/// Parse one input line.
///
/// # Errors
/// `UnknownCommand` for an unrecognised verb, `InvalidRequest` for a known
/// verb with unusable arguments.
pub fn parse_line(line: &str) -> Result<ReplInput> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplInput::Empty);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "search" => parse_search(rest)?,
        "analyze" => UserCommand::Analyze {
            video_ids: parse_video_ids(rest)?,
        },
        "ask" => {
            if rest.is_empty() {
                return Err(ClientError::InvalidRequest("ask needs a question".into()));
            }
            UserCommand::Ask {
                question: rest.to_string(),
            }
        }
        "followup" => UserCommand::Followup {
            index: parse_ordinal(verb, rest)?,
        },
        "select" => UserCommand::Select {
            index: parse_ordinal(verb, rest)?,
        },
        "status" => UserCommand::Status,
        "help" | "?" => return Ok(ReplInput::Help),
        "quit" | "exit" => return Ok(ReplInput::Quit),
        other => return Err(ClientError::UnknownCommand(other.to_string())),
    };
    Ok(ReplInput::Command(command))
}

fn parse_search(rest: &str) -> Result<UserCommand> {
    let mut category = None;
    let mut text = rest;
    if let Some(after) = rest.strip_prefix("--category") {
        let after = after.trim_start();
        let (id, remainder) = after
            .split_once(char::is_whitespace)
            .unwrap_or((after, ""));
        if id.is_empty() {
            return Err(ClientError::InvalidRequest("--category needs an id".into()));
        }
        category = Some(id);
        text = remainder;
    }
    Ok(UserCommand::Search {
        category_id: optional_input(category),
        free_text: optional_input(Some(text)),
    })
}

/// 1-based position on the command line, 0-based index in the command.
fn parse_ordinal(verb: &str, rest: &str) -> Result<usize> {
    match rest.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(ClientError::InvalidRequest(format!(
            "{verb} needs a number starting at 1"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("search roadmap q3", None, Some("roadmap q3"))]
    #[case("search --category 77 roadmap", Some("77"), Some("roadmap"))]
    #[case("search --category 77", Some("77"), None)]
    #[case("search", None, None)]
    #[case("SEARCH   spaced  ", None, Some("spaced"))]
    fn test_search_forms(
        #[case] line: &str,
        #[case] category: Option<&str>,
        #[case] text: Option<&str>,
    ) {
        let parsed = parse_line(line).unwrap();
        assert_eq!(
            parsed,
            ReplInput::Command(UserCommand::Search {
                category_id: category.map(String::from),
                free_text: text.map(String::from),
            })
        );
    }

    #[test]
    fn test_search_category_without_id() {
        assert!(parse_line("search --category").is_err());
    }

    #[test]
    fn test_analyze_splits_ids() {
        let parsed = parse_line("analyze 1_a, 1_b,1_c").unwrap();
        assert_eq!(
            parsed,
            ReplInput::Command(UserCommand::Analyze {
                video_ids: vec!["1_a".into(), "1_b".into(), "1_c".into()],
            })
        );
        assert!(parse_line("analyze ,").is_err());
    }

    #[test]
    fn test_ask_keeps_full_question() {
        let parsed = parse_line("ask what  was decided?").unwrap();
        assert_eq!(
            parsed,
            ReplInput::Command(UserCommand::Ask {
                question: "what  was decided?".into()
            })
        );
        assert!(parse_line("ask").is_err());
    }

    #[rstest]
    #[case("followup 1", UserCommand::Followup { index: 0 })]
    #[case("select 3", UserCommand::Select { index: 2 })]
    #[case("status", UserCommand::Status)]
    fn test_simple_commands(#[case] line: &str, #[case] expected: UserCommand) {
        assert_eq!(parse_line(line).unwrap(), ReplInput::Command(expected));
    }

    #[rstest]
    #[case("followup 0")]
    #[case("select x")]
    #[case("followup")]
    fn test_bad_ordinals(#[case] line: &str) {
        assert!(matches!(parse_line(line), Err(ClientError::InvalidRequest(_))));
    }

    #[test]
    fn test_meta_inputs() {
        assert_eq!(parse_line("  ").unwrap(), ReplInput::Empty);
        assert_eq!(parse_line("help").unwrap(), ReplInput::Help);
        assert_eq!(parse_line("exit").unwrap(), ReplInput::Quit);
        assert!(matches!(
            parse_line("frobnicate now"),
            Err(ClientError::UnknownCommand(v)) if v == "frobnicate"
        ));
    }
}
