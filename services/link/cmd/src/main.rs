//! Serial link testbench binary.
//!
//! This is the main binary for exercising a serial link peer: it transmits
//! single frames, segmented transfers and raw slices, and runs a receive
//! loop that prints every verified frame and reassembled payload.

use anyhow::Context;
use clap::Parser;
use link_port::{
    available_port_names, ChannelSink, LinkEvent, RxWorker, SerialTransport, Transmitter,
    DEFAULT_READ_TIMEOUT,
};
use link_wire::MAX_PAYLOAD;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::LinkConfig;

/// Frame-level TX/RX testbench for the serial link
#[derive(Parser, Debug)]
#[command(name = "uart-link", version, about = "Frame-level TX/RX testbench for the serial link")]
struct Args {
    /// Serial port (e.g. /dev/ttyUSB0)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate
    #[arg(long, default_value_t = 115200)]
    baud: u32,

    /// Only listen, never transmit
    #[arg(long)]
    rx_only: bool,

    /// Send a UTF-8 string as a single frame
    #[arg(long)]
    send: Option<String>,

    /// Send hex byte tokens as a single frame, e.g. "01 02 AA" or "0xDE,0xAD"
    #[arg(long)]
    send_hex: Option<String>,

    /// Send file contents as a segmented transfer
    #[arg(long)]
    send_file: Option<PathBuf>,

    /// Segment transfer id
    #[arg(long, default_value_t = 1)]
    xid: u8,

    /// Repeat count for --send/--send-hex
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Delay between transmitted frames, e.g. 10ms
    #[arg(long, default_value = "10ms")]
    per_frame_delay: humantime::Duration,

    /// Slice oversized payloads into plain frames instead of segmenting
    #[arg(long)]
    buffer_mode: bool,

    /// Less verbose output (warnings and errors only)
    #[arg(long)]
    quiet: bool,

    /// Exit after sending instead of staying in the receive loop
    #[arg(long)]
    exit_after_send: bool,

    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.quiet { "warn" } else { args.log_level.as_str() };
    let env_filter = EnvFilter::new(if args.quiet { "warn" } else { "info" })
        .add_directive(format!("uart_link={}", level).parse()?)
        .add_directive(format!("link_port={}", level).parse()?)
        .add_directive(format!("link_wire={}", level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!("Starting uart-link v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from file, then let explicit flags win
    let link_config = LinkConfig::load_from_file(&args.config);

    let port_path = args
        .port
        .clone()
        .or_else(|| link_config.port.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no serial port configured; pass --port or set one in {}",
                args.config.display()
            )
        })?;
    let baud = if args.baud == 115200 {
        // Default value
        link_config.baud
    } else {
        args.baud
    };
    let pacing = if Duration::from(args.per_frame_delay) == Duration::from_millis(10) {
        // Default value
        Duration::from_millis(link_config.per_frame_delay_ms)
    } else {
        Duration::from(args.per_frame_delay)
    };

    let transport = SerialTransport::open(&port_path, baud, DEFAULT_READ_TIMEOUT).map_err(|e| {
        let ports = available_port_names();
        if ports.is_empty() {
            anyhow::anyhow!("{}", e)
        } else {
            anyhow::anyhow!("{} (available ports: {})", e, ports.join(", "))
        }
    })?;
    let writer = if args.rx_only {
        None
    } else {
        Some(transport.try_clone()?)
    };

    // The receive worker owns the read half; events arrive on the channel.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let worker = RxWorker::new(transport, ChannelSink::new(event_tx));
    let stop = worker.stop_handle();
    let rx_task = tokio::task::spawn_blocking(move || worker.run());

    if let Some(writer) = writer {
        // Resolve everything to send before touching the wire, so argument
        // errors surface immediately.
        let file_data = match &args.send_file {
            Some(path) => {
                let data = std::fs::read(path)
                    .with_context(|| format!("could not read file {}", path.display()))?;
                info!(
                    "Sending file {} ({} bytes) as transfer {}",
                    path.display(),
                    data.len(),
                    args.xid
                );
                Some(data)
            }
            None => None,
        };
        let payload = if let Some(text) = &args.send {
            Some(text.clone().into_bytes())
        } else if let Some(hex) = &args.send_hex {
            Some(parse_hex_bytes(hex).context("invalid --send-hex")?)
        } else {
            None
        };

        let mut tx = Transmitter::new(writer, pacing);
        let xid = args.xid;
        let repeat = args.repeat;
        let buffer_mode = args.buffer_mode;
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            if let Some(data) = file_data {
                tx.send_segmented(&data, xid)?;
            }
            if let Some(payload) = payload {
                for _ in 0..repeat {
                    if payload.len() <= MAX_PAYLOAD {
                        tx.send_frame(&payload)?;
                    } else if buffer_mode {
                        info!(
                            "Payload {}B exceeds the {}B frame limit, slicing without segment headers",
                            payload.len(),
                            MAX_PAYLOAD
                        );
                        tx.send_raw(&payload)?;
                    } else {
                        info!(
                            "Payload {}B exceeds the {}B frame limit, using segmented transfer {}",
                            payload.len(),
                            MAX_PAYLOAD,
                            xid
                        );
                        tx.send_segmented(&payload, xid)?;
                    }
                }
            }
            Ok(())
        })
        .await??;

        if args.exit_after_send {
            stop.stop();
            rx_task.await?;
            return Ok(());
        }
    }

    // Main event loop - print receive events until a shutdown signal
    info!("Receive loop running. Press Ctrl+C to stop.");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to install SIGTERM handler: {}", e))?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to install SIGINT handler: {}", e))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }

            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }

            event = event_rx.recv() => {
                match event {
                    Some(event) => print_event(event),
                    None => {
                        warn!("Receive worker stopped, exiting");
                        break;
                    }
                }
            }
        }
    }

    stop.stop();
    rx_task.await?;
    Ok(())
}

/// Print one receive event the way the operator expects to read it.
fn print_event(event: LinkEvent) {
    match event {
        LinkEvent::Frame { frame } => {
            info!(
                "Frame: {} bytes, raw {}",
                frame.data.len(),
                hex_preview(&frame.raw, 24)
            );
            match std::str::from_utf8(&frame.data) {
                Ok(text) => info!("Data (text): {:?}", text),
                Err(_) => info!("Data (hex): {}", hex_preview(&frame.data, 64)),
            }
        }
        LinkEvent::SegmentProgress {
            transfer_id,
            received,
            total,
        } => {
            info!("Transfer {}: {}/{} bytes", transfer_id, received, total);
        }
        LinkEvent::PayloadComplete {
            transfer_id,
            payload,
        } => {
            info!("Transfer {} complete: {} bytes", transfer_id, payload.len());
            match std::str::from_utf8(&payload) {
                Ok(text) => {
                    let preview: String = text.chars().take(200).collect();
                    info!("Payload (text): {:?}", preview);
                }
                Err(_) => info!("Payload (hex): {}", hex_preview(&payload, 64)),
            }
        }
    }
}

/// Parse whitespace- or comma-separated hex byte tokens, each optionally
/// prefixed with 0x.
fn parse_hex_bytes(s: &str) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    for tok in s.replace(',', " ").split_whitespace() {
        let digits = tok
            .strip_prefix("0x")
            .or_else(|| tok.strip_prefix("0X"))
            .unwrap_or(tok);
        let value = u16::from_str_radix(digits, 16)
            .map_err(|_| anyhow::anyhow!("invalid hex byte: {:?}", tok))?;
        if value > 0xFF {
            anyhow::bail!("hex byte out of range: {:?}", tok);
        }
        out.push(value as u8);
    }
    if out.is_empty() {
        anyhow::bail!("no hex bytes given");
    }
    Ok(out)
}

fn hex_preview(data: &[u8], max: usize) -> String {
    let shown: Vec<String> = data.iter().take(max).map(|b| format!("{:02X}", b)).collect();
    let mut out = shown.join(" ");
    if data.len() > max {
        out.push_str(" ..");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_tokens() {
        assert_eq!(parse_hex_bytes("01 02 AA").unwrap(), vec![0x01, 0x02, 0xAA]);
        assert_eq!(parse_hex_bytes("0xDE,0xAD").unwrap(), vec![0xDE, 0xAD]);
        assert_eq!(parse_hex_bytes("  5,0X0a  ").unwrap(), vec![0x05, 0x0A]);
    }

    #[test]
    fn test_parse_hex_rejects_bad_tokens() {
        assert!(parse_hex_bytes("zz").is_err());
        assert!(parse_hex_bytes("100").is_err());
        assert!(parse_hex_bytes("01 0x").is_err());
        assert!(parse_hex_bytes("").is_err());
    }

    #[test]
    fn test_hex_preview_truncates() {
        assert_eq!(hex_preview(&[0xAA, 0x05], 4), "AA 05");
        assert_eq!(hex_preview(&[1, 2, 3, 4, 5], 3), "01 02 03 ..");
    }
}
