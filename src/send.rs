//! `trilho send`: a UDP test sender standing in for the rail device.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use trilho_core::parse_text;
use trilho_settings::TrilhoSettings;

/// Flags for `trilho send`.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Payloads to send verbatim. With none (and no `--sweep`), lines are
    /// read from stdin until EOF or `quit`.
    pub values: Vec<String>,

    /// Bridge UDP address (defaults to `127.0.0.1:<udp.port>`).
    #[arg(long)]
    pub target: Option<String>,

    /// Send 0.0 to 1.0 in steps of 0.1.
    #[arg(long)]
    pub sweep: bool,

    /// Pause between datagrams.
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
}

/// `0.0, 0.1, ..., 1.0` as payload strings.
fn sweep_payloads() -> Vec<String> {
    (0..=10u8)
        .map(|step| format!("{:.1}", f64::from(step) / 10.0))
        .collect()
}

struct Sender {
    socket: UdpSocket,
    target: String,
}

impl Sender {
    async fn send(&self, payload: &str) -> Result<()> {
        let _ = self
            .socket
            .send_to(payload.as_bytes(), &self.target)
            .await
            .with_context(|| format!("failed to send to {}", self.target))?;
        match parse_text(payload) {
            Ok(value) => println!("sent {payload:?} ({:.1}%)", value.as_percent()),
            Err(e) => println!("sent {payload:?} (bridge will drop it: {e})"),
        }
        Ok(())
    }

    async fn send_all(&self, payloads: &[String], interval: Duration) -> Result<()> {
        for (i, payload) in payloads.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            self.send(payload).await?;
        }
        Ok(())
    }
}

pub async fn run(settings: &TrilhoSettings, args: SendArgs) -> Result<()> {
    let target = args
        .target
        .unwrap_or_else(|| format!("127.0.0.1:{}", settings.udp.port));
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind UDP socket")?;
    let sender = Sender { socket, target };
    let interval = Duration::from_millis(args.interval_ms);

    if args.sweep {
        return sender.send_all(&sweep_payloads(), interval).await;
    }
    if !args.values.is_empty() {
        return sender.send_all(&args.values, interval).await;
    }

    println!("type a value between 0 and 1, \"sweep\" for a sweep, \"quit\" to exit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match line.trim() {
            "" => {}
            "quit" => break,
            "sweep" => sender.send_all(&sweep_payloads(), interval).await?,
            payload => sender.send(payload).await?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_covers_unit_range() {
        let payloads = sweep_payloads();
        assert_eq!(payloads.len(), 11);
        assert_eq!(payloads.first().map(String::as_str), Some("0.0"));
        assert_eq!(payloads[3], "0.3");
        assert_eq!(payloads.last().map(String::as_str), Some("1.0"));
        assert!(payloads.iter().all(|p| parse_text(p).is_ok()));
    }

    #[tokio::test]
    async fn sends_payloads_verbatim_in_order() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = Sender {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            target: receiver.local_addr().unwrap().to_string(),
        };
        let payloads = vec!["0.25".to_string(), "abc".to_string()];
        sender.send_all(&payloads, Duration::ZERO).await.unwrap();

        let mut buf = [0u8; 64];
        for expected in ["0.25", "abc"] {
            let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], expected.as_bytes());
        }
    }
}
