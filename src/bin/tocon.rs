use clap::{App, Arg};
use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use tocon::msg::MAX_RECORD_LEN;
use tocon::sink::{BroadcastSink, StdoutSink, Tee};
use tocon::version::version_string;
use tocon::{Gateway, GatewayConfig, MemoryBus, StaticTableService, SystemClock, TracingEvents};

const TEXT_BROADCAST_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("tocon")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("Telemetry output console: software bus records to text lines")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ingest")
                .long("ingest")
                .value_name("ADDR")
                .help("UDP address receiving raw bus records")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("text")
                .long("text")
                .value_name("ADDR")
                .help("TCP address serving text lines")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("log-level")
                .short("l")
                .long("log-level")
                .value_name("LEVEL")
                .help("trace, debug, info, warn or error")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Do not echo lines to stdout"),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(addr) = matches.value_of("ingest") {
        config.ingest_addr = addr.to_string();
    }
    if let Some(addr) = matches.value_of("text") {
        config.text_addr = addr.to_string();
    }
    if let Some(level) = matches.value_of("log-level") {
        config.log_level = level.to_string();
    }
    config.validate()?;

    tracing_subscriber::fmt().with_max_level(config.level()?).init();

    println!("{}", "TO Console".bright_blue().bold());
    println!("{}", version_string().dimmed());
    println!("  ingest (udp): {}", config.ingest_addr.green());
    println!("  text   (tcp): {}", config.text_addr.green());

    let (text_tx, _) = broadcast::channel::<String>(TEXT_BROADCAST_BUFFER_SIZE);
    let stdout = if matches.is_present("quiet") { None } else { Some(StdoutSink) };
    let sink = Tee::new(stdout, BroadcastSink::new(text_tx.clone()));

    let bus = MemoryBus::new();
    let mut tables = StaticTableService::new(config.subscription_table()?);
    let ingest_addr = config.ingest_addr.clone();
    let text_addr = config.text_addr.clone();

    let mut gateway = Gateway::init(config, bus.clone(), &mut tables, sink, TracingEvents, SystemClock)?;

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let worker = thread::Builder::new()
        .name("tocon-worker".into())
        .spawn(move || gateway.run(&worker_stop))?;

    let udp = UdpSocket::bind(ingest_addr.as_str()).await?;
    let ingest = tokio::spawn(ingest_records(udp, bus));

    let listener = TcpListener::bind(text_addr.as_str()).await?;
    let server = tokio::spawn(serve_text(listener, text_tx));

    tokio::signal::ctrl_c().await?;
    println!("{}", "stopping...".yellow());
    stop.store(true, Ordering::Relaxed);

    ingest.abort();
    server.abort();
    match tokio::task::spawn_blocking(move || worker.join()).await? {
        Ok(cycles) => info!("worker finished after {} cycles", cycles),
        Err(_) => error!("worker thread panicked"),
    }

    println!("{}", "TO Console stopped".bright_blue());
    Ok(())
}

/// Publishes every datagram onto the bus as one record.
async fn ingest_records(socket: UdpSocket, bus: MemoryBus) {
    let mut buf = [0u8; MAX_RECORD_LEN];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => match bus.publish_bytes(&buf[..len]) {
                Ok(0) => debug!("record from {} has no subscriber", from),
                Ok(_) => {}
                Err(e) => warn!("dropping datagram from {}: {}", from, e),
            },
            Err(e) => {
                error!("ingest socket error: {}", e);
                break;
            }
        }
    }
}

async fn serve_text(listener: TcpListener, text_tx: broadcast::Sender<String>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("text client connected: {}", addr);
                let rx = text_tx.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = stream_lines(stream, rx).await {
                        warn!("text client {} error: {}", addr, e);
                    }
                    info!("text client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("failed to accept connection: {}", e);
            }
        }
    }
}

async fn stream_lines(mut stream: TcpStream, mut rx: broadcast::Receiver<String>) -> std::io::Result<()> {
    loop {
        match rx.recv().await {
            Ok(line) => {
                stream.write_all(line.as_bytes()).await?;
                stream.write_all(b"\n").await?;
            }
            Err(RecvError::Lagged(skipped)) => warn!("text client lagging, {} lines skipped", skipped),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}
