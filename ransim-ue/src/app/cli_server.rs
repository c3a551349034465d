//! UE CLI command parsing

use crate::tasks::UeCliCommand;

/// Outcome of parsing a request that is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A command to execute
    Command(UeCliCommand),
    /// Direct output (help text), no command constructed
    Output(String),
}

const UE_HELP: &str = "\
info                                    | Show some information about the UE
status                                  | Show some status information about the UE
timers                                  | Dump the NAS timer states
deregister <normal|switch-off> [disable-5g]
                                        | Trigger a de-registration procedure";

/// Parses a UE CLI request.
pub fn parse_ue_cli_command(tokens: &[&str]) -> Result<ParseOutcome, String> {
    if tokens.is_empty() {
        return Err("Empty command".to_string());
    }

    match tokens[0] {
        "help" | "--help" | "commands" => Ok(ParseOutcome::Output(UE_HELP.to_string())),
        "info" => Ok(ParseOutcome::Command(UeCliCommand::Info)),
        "status" => Ok(ParseOutcome::Command(UeCliCommand::Status)),
        "timers" => Ok(ParseOutcome::Command(UeCliCommand::Timers)),
        "deregister" => {
            if tokens.len() < 2 {
                return Err("deregister requires a mode: normal | switch-off".to_string());
            }
            let is_switch_off = match tokens[1] {
                "normal" => false,
                "switch-off" => true,
                other => return Err(format!("Invalid de-registration mode: {other}")),
            };
            let due_to_disable_5g = match tokens.get(2) {
                None => false,
                Some(&"disable-5g") => true,
                Some(other) => return Err(format!("Invalid de-registration option: {other}")),
            };
            Ok(ParseOutcome::Command(UeCliCommand::DeRegister {
                is_switch_off,
                due_to_disable_5g,
            }))
        }
        other => Err(format!("Unknown command: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<ParseOutcome, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        parse_ue_cli_command(&tokens)
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("info").unwrap(), ParseOutcome::Command(UeCliCommand::Info));
        assert_eq!(parse("status").unwrap(), ParseOutcome::Command(UeCliCommand::Status));
        assert_eq!(parse("timers").unwrap(), ParseOutcome::Command(UeCliCommand::Timers));
    }

    #[test]
    fn test_parse_deregister_variants() {
        assert_eq!(
            parse("deregister normal").unwrap(),
            ParseOutcome::Command(UeCliCommand::DeRegister {
                is_switch_off: false,
                due_to_disable_5g: false,
            })
        );
        assert_eq!(
            parse("deregister switch-off disable-5g").unwrap(),
            ParseOutcome::Command(UeCliCommand::DeRegister {
                is_switch_off: true,
                due_to_disable_5g: true,
            })
        );
    }

    #[test]
    fn test_parse_help() {
        match parse("help").unwrap() {
            ParseOutcome::Output(text) => assert!(text.contains("deregister")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").unwrap_err().contains("Empty"));
        assert!(parse("reboot").unwrap_err().contains("Unknown"));
        assert!(parse("deregister").unwrap_err().contains("requires"));
        assert!(parse("deregister maybe").unwrap_err().contains("Invalid"));
    }
}
