use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use memifctl_api::{InterfaceDetails, MessageKind, SocketFilenameDetails};
use serde::Serialize;

use crate::cmd::Outcome;
use crate::registry::CommandRegistry;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct OutcomeOutput<'a> {
    command: &'a str,
    retval: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sw_if_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    socket_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interfaces: Option<Vec<&'a InterfaceDetails>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sockets: Option<Vec<&'a SocketFilenameDetails>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> OutcomeOutput<'a> {
    fn new(outcome: &'a Outcome) -> Self {
        let mut out = Self {
            command: &outcome.command,
            retval: outcome.retval,
            sw_if_index: None,
            socket_id: None,
            interfaces: None,
            sockets: None,
            error: outcome.error.as_deref(),
        };
        let Some(completion) = &outcome.completion else {
            return out;
        };
        match outcome.kind {
            Some(MessageKind::Create) => out.sw_if_index = completion.assigned_handle(),
            Some(MessageKind::SocketFilenameAddDelV2) => {
                out.socket_id = completion.assigned_handle()
            }
            Some(MessageKind::Dump) => out.interfaces = Some(completion.interfaces().collect()),
            Some(MessageKind::SocketFilenameDump) => {
                out.sockets = Some(completion.sockets().collect())
            }
            _ => {}
        }
        out
    }
}

pub fn print_outcome(outcome: &Outcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&OutcomeOutput::new(outcome)),
        OutputFormat::Table => print_table(outcome),
        OutputFormat::Pretty => print_pretty(outcome),
        OutputFormat::Raw => println!("{}", outcome.retval),
    }
    if !matches!(format, OutputFormat::Json) {
        if let Some(error) = &outcome.error {
            eprintln!("error: {}: {error}", outcome.command);
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_table(outcome: &Outcome) {
    let completion = outcome.completion.as_ref().filter(|c| c.is_success());
    let table = match (outcome.kind, completion) {
        (Some(MessageKind::Dump), Some(completion)) => {
            let mut table = new_table(vec![
                "NAME",
                "SW_IF_INDEX",
                "MAC",
                "ID",
                "SOCKET_ID",
                "ROLE",
                "MODE",
                "RING",
                "BUFFER",
                "ADMIN",
                "LINK",
            ]);
            for d in completion.interfaces() {
                table.add_row(vec![
                    d.if_name.clone(),
                    d.sw_if_index.to_string(),
                    d.hw_addr.to_string(),
                    d.id.to_string(),
                    d.socket_id.to_string(),
                    d.role.to_string(),
                    d.mode.to_string(),
                    d.ring_size.to_string(),
                    d.buffer_size.to_string(),
                    up_down(d.admin_up).to_string(),
                    up_down(d.link_up).to_string(),
                ]);
            }
            table
        }
        (Some(MessageKind::SocketFilenameDump), Some(completion)) => {
            let mut table = new_table(vec!["SOCKET_ID", "FILENAME"]);
            for s in completion.sockets() {
                table.add_row(vec![s.socket_id.to_string(), s.socket_filename.clone()]);
            }
            table
        }
        _ => {
            let mut table = new_table(vec!["COMMAND", "RETVAL", "RESULT"]);
            table.add_row(vec![
                outcome.command.clone(),
                outcome.retval.to_string(),
                summary(outcome),
            ]);
            table
        }
    };
    println!("{table}");
}

fn print_pretty(outcome: &Outcome) {
    let Some(completion) = outcome.completion.as_ref().filter(|c| c.is_success()) else {
        println!("{} failed, retval {}", outcome.command, outcome.retval);
        return;
    };
    match outcome.kind {
        Some(MessageKind::Dump) => {
            for d in completion.interfaces() {
                println!("{}: sw_if_index {} mac {}", d.if_name, d.sw_if_index, d.hw_addr);
                println!("   id {} socket-id {} role {}", d.id, d.socket_id, d.role);
                println!("   ring_size {} buffer_size {}", d.ring_size, d.buffer_size);
                println!("   state {} link {}", up_down(d.admin_up), up_down(d.link_up));
            }
        }
        Some(MessageKind::SocketFilenameDump) => {
            for s in completion.sockets() {
                println!("id {} : filename {}", s.socket_id, s.socket_filename);
            }
        }
        _ => println!("{}", summary(outcome)),
    }
}

fn summary(outcome: &Outcome) -> String {
    let handle = outcome
        .completion
        .as_ref()
        .and_then(|completion| completion.assigned_handle());
    match (outcome.kind, handle) {
        (Some(MessageKind::Create), Some(index)) => {
            format!("created memif with sw_if_index {index}")
        }
        (Some(MessageKind::SocketFilenameAddDelV2), Some(id)) => {
            format!("created memif socket with socket_id {id}")
        }
        _ if outcome.retval == 0 => "ok".to_string(),
        _ => match &outcome.error {
            Some(error) => error.clone(),
            None => format!("rejected by dataplane ({})", outcome.retval),
        },
    }
}

fn up_down(up: bool) -> &'static str {
    if up {
        "up"
    } else {
        "down"
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    name: &'a str,
    alias: &'a str,
    dump: bool,
    usage: &'a str,
}

pub fn print_commands(registry: &CommandRegistry, format: OutputFormat) {
    let commands: Vec<CommandOutput<'_>> = registry
        .iter()
        .map(|command| CommandOutput {
            name: command.name,
            alias: command.alias,
            dump: command.is_dump(),
            usage: command.usage,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&commands),
        OutputFormat::Table => {
            let mut table = new_table(vec!["COMMAND", "ALIAS", "USAGE"]);
            for command in &commands {
                table.add_row(vec![command.name, command.alias, command.usage]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for command in &commands {
                println!("{} ({}) {}", command.name, command.alias, command.usage);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use memifctl_api::{MacAddress, Reply};
    use memifctl_api::{InterfaceMode, InterfaceRole};
    use memifctl_client::Completion;

    use super::*;

    fn created(retval: i32) -> Outcome {
        Outcome {
            command: "memif_create".to_string(),
            kind: Some(MessageKind::Create),
            retval,
            completion: Some(Completion {
                retval,
                reply: Reply::Create {
                    retval,
                    sw_if_index: 4,
                },
                records: Vec::new(),
            }),
            error: None,
        }
    }

    #[test]
    fn create_reports_the_assigned_index() {
        let outcome = created(0);
        let json = serde_json::to_value(OutcomeOutput::new(&outcome)).expect("json");
        assert_eq!(json["sw_if_index"], 4);
        assert_eq!(json["retval"], 0);
        assert!(json.get("error").is_none());
        assert_eq!(summary(&outcome), "created memif with sw_if_index 4");
    }

    #[test]
    fn rejected_create_has_no_index() {
        let outcome = created(-3);
        let json = serde_json::to_value(OutcomeOutput::new(&outcome)).expect("json");
        assert!(json.get("sw_if_index").is_none());
        assert_eq!(json["retval"], -3);
    }

    #[test]
    fn dump_lists_interfaces_even_when_empty() {
        let details = InterfaceDetails {
            sw_if_index: 1,
            hw_addr: MacAddress([2, 0xfe, 0, 0, 0, 1]),
            id: 0,
            role: InterfaceRole::Master,
            mode: InterfaceMode::Ethernet,
            socket_id: 0,
            ring_size: 1024,
            buffer_size: 2048,
            admin_up: true,
            link_up: false,
            if_name: "memif0/0".to_string(),
        };
        let ping = Reply::ControlPing {
            retval: 0,
            client_index: 1,
            vpe_pid: 42,
        };
        let mut outcome = Outcome {
            command: "memif_dump".to_string(),
            kind: Some(MessageKind::Dump),
            retval: 0,
            completion: Some(Completion {
                retval: 0,
                reply: ping.clone(),
                records: vec![Reply::Details(details)],
            }),
            error: None,
        };

        let json = serde_json::to_value(OutcomeOutput::new(&outcome)).expect("json");
        assert_eq!(json["interfaces"][0]["if_name"], "memif0/0");
        assert_eq!(json["interfaces"][0]["hw_addr"], "02:fe:00:00:00:01");
        assert_eq!(json["interfaces"][0]["role"], "master");

        outcome.completion = Some(Completion {
            retval: 0,
            reply: ping,
            records: Vec::new(),
        });
        let json = serde_json::to_value(OutcomeOutput::new(&outcome)).expect("json");
        assert_eq!(json["interfaces"], serde_json::json!([]));
    }

    #[test]
    fn local_errors_carry_a_message() {
        let outcome = Outcome::local_error("memif_create", Some(MessageKind::Create), "bad ring");
        let json = serde_json::to_value(OutcomeOutput::new(&outcome)).expect("json");
        assert_eq!(json["retval"], -99);
        assert_eq!(json["error"], "bad ring");
        assert_eq!(summary(&outcome), "bad ring");
    }
}
