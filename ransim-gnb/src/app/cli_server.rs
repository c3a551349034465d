//! gNB CLI command parsing
//!
//! The CLI server task turns a whitespace-tokenized request into a typed
//! [`GnbCliCommand`]. Help requests produce an output string without
//! constructing a command; parse failures produce a human-readable
//! error.

use crate::tasks::GnbCliCommand;

/// Outcome of parsing a request that is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A command to execute
    Command(GnbCliCommand),
    /// Direct output (help text), no command constructed
    Output(String),
}

const GNB_HELP: &str = "\
status                      | Show some status information about the gNB
info                        | Show some information about the gNB
amf-list                    | List all AMFs associated with the gNB
amf-info <amf-id>           | Show some status information about the given AMF
ue-list                     | List all UEs associated with the gNB
ue-count                    | Print the total number of UEs connected to this gNB
handoverprepare <ue-id>     | Trigger the handover preparation hook for the given UE
handover <as-amf-id> <amf-ue-ngap-id> <ran-ue-ngap-id> <ctxt-id> <uplink-stream> <amf-name>
                            | Trigger an Xn handover path switch request";

fn parse_arg<T: std::str::FromStr>(token: &str, what: &str) -> Result<T, String> {
    token
        .parse::<T>()
        .map_err(|_| format!("Invalid {what}: {token}"))
}

fn expect_arity(tokens: &[&str], expected: usize) -> Result<(), String> {
    if tokens.len() != expected + 1 {
        return Err(format!(
            "Command '{}' expects {} argument(s), got {}",
            tokens[0],
            expected,
            tokens.len() - 1
        ));
    }
    Ok(())
}

/// Parses a gNB CLI request.
pub fn parse_gnb_cli_command(tokens: &[&str]) -> Result<ParseOutcome, String> {
    if tokens.is_empty() {
        return Err("Empty command".to_string());
    }

    match tokens[0] {
        "help" | "--help" | "commands" => Ok(ParseOutcome::Output(GNB_HELP.to_string())),
        "status" => {
            expect_arity(tokens, 0)?;
            Ok(ParseOutcome::Command(GnbCliCommand::Status))
        }
        "info" => {
            expect_arity(tokens, 0)?;
            Ok(ParseOutcome::Command(GnbCliCommand::Info))
        }
        "amf-list" => {
            expect_arity(tokens, 0)?;
            Ok(ParseOutcome::Command(GnbCliCommand::AmfList))
        }
        "amf-info" => {
            expect_arity(tokens, 1)?;
            let amf_id = parse_arg(tokens[1], "AMF ID")?;
            Ok(ParseOutcome::Command(GnbCliCommand::AmfInfo { amf_id }))
        }
        "ue-list" => {
            expect_arity(tokens, 0)?;
            Ok(ParseOutcome::Command(GnbCliCommand::UeList))
        }
        "ue-count" => {
            expect_arity(tokens, 0)?;
            Ok(ParseOutcome::Command(GnbCliCommand::UeCount))
        }
        "handoverprepare" => {
            expect_arity(tokens, 1)?;
            let ue_id = parse_arg(tokens[1], "UE ID")?;
            Ok(ParseOutcome::Command(GnbCliCommand::HandoverPrepare { ue_id }))
        }
        "handover" => {
            expect_arity(tokens, 6)?;
            Ok(ParseOutcome::Command(GnbCliCommand::Handover {
                as_amf_id: parse_arg(tokens[1], "AMF ID")?,
                amf_ue_ngap_id: parse_arg(tokens[2], "AMF UE NGAP ID")?,
                ran_ue_ngap_id: parse_arg(tokens[3], "RAN UE NGAP ID")?,
                ctxt_id: parse_arg(tokens[4], "context ID")?,
                uplink_stream: parse_arg(tokens[5], "uplink stream")?,
                amf_name: tokens[6].to_string(),
            }))
        }
        other => Err(format!("Unknown command: {other}")),
    }
}
