use std::time::Instant;

use memifctl_api::MessageEntry;
use serde::Serialize;

use crate::cmd::Context;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct PeerCreds {
    uid: u32,
    gid: u32,
    pid: u32,
}

#[derive(Serialize)]
struct InfoOutput {
    socket: String,
    protocol_version: String,
    client_index: u32,
    message_count: usize,
    memif_supported: bool,
    vpe_pid: Option<u32>,
    ping_latency_ms: Option<f64>,
    peer_credentials: Option<PeerCreds>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    messages: Vec<MessageEntry>,
}

pub fn run(ctx: &Context<'_>) -> CliResult<i32> {
    let client = ctx
        .connect()
        .map_err(|err| client_error("connect failed", err))?;

    let started = Instant::now();
    let ping = client.ping().ok().filter(|c| c.is_success());
    let ping_latency_ms = ping
        .as_ref()
        .map(|_| (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0);

    let table = client.message_table();
    let out = InfoOutput {
        socket: ctx.client.socket_path.display().to_string(),
        protocol_version: client.protocol_version().to_string(),
        client_index: client.client_index(),
        message_count: table.len(),
        memif_supported: table.supports_memif(),
        vpe_pid: ping.as_ref().and_then(|c| c.vpe_pid()),
        ping_latency_ms,
        peer_credentials: client
            .peer_credentials()
            .map(|(uid, gid, pid)| PeerCreds { uid, gid, pid }),
        messages: match ctx.format {
            OutputFormat::Json => table.entries(),
            _ => Vec::new(),
        },
    };

    print_info(&out, ctx.format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Connection Info:");
            println!("  Socket:           {}", out.socket);
            println!("  Protocol:         memif-api {}", out.protocol_version);
            println!("  Client index:     {}", out.client_index);
            println!(
                "  Messages:         {} (memif {})",
                out.message_count,
                if out.memif_supported {
                    "supported"
                } else {
                    "missing"
                }
            );
            match out.vpe_pid {
                Some(pid) => println!("  Dataplane pid:    {pid}"),
                None => println!("  Dataplane pid:    unavailable"),
            }
            match out.ping_latency_ms {
                Some(ms) => println!("  Ping:             {ms:.2}ms"),
                None => println!("  Ping:             unavailable"),
            }
            match &out.peer_credentials {
                Some(c) => println!(
                    "  Peer credentials: uid={} gid={} pid={}",
                    c.uid, c.gid, c.pid
                ),
                None => println!("  Peer credentials: unavailable"),
            }
        }
        OutputFormat::Raw => {
            println!("{}", out.client_index);
        }
    }
}
