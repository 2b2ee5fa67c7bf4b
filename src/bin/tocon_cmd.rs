use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use std::net::UdpSocket;
use std::time::{SystemTime, UNIX_EPOCH};

use tocon::dispatch::{NOOP_CC, RESET_COUNTERS_CC};
use tocon::mids;
use tocon::{MsgId, RecordBuf, TlmTime};

const DEFAULT_TARGET: &str = "127.0.0.1:1234";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("tocon-cmd")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("Sends commands and test telemetry to a TO Console")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("target")
                .short("t")
                .long("target")
                .value_name("ADDR")
                .help("Console UDP ingest address")
                .takes_value(true)
                .default_value(DEFAULT_TARGET)
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Print the encoded record")
                .global(true),
        )
        .subcommand(SubCommand::with_name("noop").about("No-op command"))
        .subcommand(SubCommand::with_name("reset").about("Reset command counters"))
        .subcommand(SubCommand::with_name("send-hk").about("Request a housekeeping report"))
        .subcommand(
            SubCommand::with_name("fcn")
                .about("Command with an arbitrary function code")
                .arg(Arg::with_name("code").help("Function code (0-127)").required(true)),
        )
        .subcommand(
            SubCommand::with_name("tlm")
                .about("Raw telemetry record")
                .arg(Arg::with_name("msgid").help("Message id, hex (0x0800) or decimal").required(true))
                .arg(Arg::with_name("text").help("Payload text").default_value(""))
                .arg(
                    Arg::with_name("size")
                        .long("size")
                        .value_name("BYTES")
                        .help("Pad the payload with NUL to this many bytes")
                        .takes_value(true),
                ),
        )
        .get_matches();

    let target = matches.value_of("target").unwrap_or(DEFAULT_TARGET);
    let verbose = matches.is_present("verbose");

    let (label, record) = match matches.subcommand() {
        ("noop", _) => ("noop", RecordBuf::command(mids::TO_CMD_MID, NOOP_CC, &[])?),
        ("reset", _) => ("reset", RecordBuf::command(mids::TO_CMD_MID, RESET_COUNTERS_CC, &[])?),
        ("send-hk", _) => ("send-hk", RecordBuf::command(mids::TO_SEND_HK_MID, 0, &[])?),
        ("fcn", Some(sub)) => {
            let code = sub.value_of("code").unwrap_or("0").parse::<u8>()?;
            ("fcn", RecordBuf::command(mids::TO_CMD_MID, code, &[])?)
        }
        ("tlm", Some(sub)) => ("tlm", telemetry_record(sub)?),
        (other, _) => return Err(format!("unknown command {:?}", other).into()),
    };

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let sent = socket.send_to(record.as_bytes(), target)?;

    let rec = record.record();
    println!(
        "{} {} {} ({} bytes) -> {}",
        "sent".green().bold(),
        label.bright_white(),
        rec.msg_id().to_string().cyan(),
        sent,
        target
    );
    if verbose {
        let hex: Vec<String> = record.as_bytes().iter().map(|b| format!("{:02x}", b)).collect();
        println!("  {}", hex.join(" ").dimmed());
    }
    Ok(())
}

fn telemetry_record(sub: &ArgMatches<'_>) -> Result<RecordBuf, Box<dyn std::error::Error>> {
    let msg_id: MsgId = sub.value_of("msgid").unwrap_or_default().parse()?;
    let text = sub.value_of("text").unwrap_or_default();
    let mut payload = text.as_bytes().to_vec();
    if let Some(size) = sub.value_of("size") {
        payload.resize(size.parse::<usize>()?, 0);
    }

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Ok(RecordBuf::telemetry(msg_id, TlmTime::from_millis(now_ms), &payload)?)
}
