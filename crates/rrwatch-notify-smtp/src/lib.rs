// # SMTP Notifier
//
// This crate provides a Notifier that submits change alerts to an SMTP
// relay (plain SMTP, no authentication, no TLS), the way a host's local
// mail relay is normally used.
//
// ## Dialogue
//
// ```text
// S: 220 greeting
// C: EHLO <helo_name>        (HELO if EHLO is rejected with 5xx)
// C: MAIL FROM:<from>        250
// C: RCPT TO:<to>            250 / 251
// C: DATA                    354
// C: <message> CRLF . CRLF   250
// C: QUIT
// ```
//
// One delivery attempt per alert. The connect and the whole dialogue run
// under one deadline. Any failure is an `Error::Notify` carrying the
// relay's reply; the detector decides what happens next.

pub mod message;

use rrwatch_core::config::SmtpConfig;
use rrwatch_core::traits::{ChangeAlert, Notifier};
use rrwatch_core::{Error, Result};

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// A parsed SMTP reply (possibly multi-line)
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }
}

/// SMTP relay notifier
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    /// Relay host
    relay: String,

    /// Relay port
    port: u16,

    /// Name announced in EHLO/HELO
    helo_name: String,

    /// Deadline for connect plus dialogue
    timeout: Duration,
}

impl SmtpNotifier {
    /// Create a new SMTP notifier
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            relay: config.relay.clone(),
            port: config.port,
            helo_name: config.helo_name.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Connect and deliver one alert
    async fn deliver(&self, alert: &ChangeAlert) -> Result<()> {
        let stream = TcpStream::connect((self.relay.as_str(), self.port))
            .await
            .map_err(|e| {
                Error::notify(format!(
                    "Failed to connect to {}:{}: {}",
                    self.relay, self.port, e
                ))
            })?;

        tracing::debug!("Connected to mail relay {}:{}", self.relay, self.port);

        let payload = message::render(alert, chrono::Utc::now());
        submit(stream, &self.helo_name, &alert.from, &alert.to, &payload).await
    }
}

#[async_trait::async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, alert: &ChangeAlert) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.deliver(alert)).await {
            Ok(Ok(())) => {
                tracing::debug!("Sending of the alert to {} was successful", alert.to);
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::debug!("Alert delivery via {} failed: {}", self.relay, e);
                match e {
                    Error::Notify(_) => Err(e),
                    other => Err(Error::notify(format!(
                        "Mail relay {}:{} dialogue failed: {}",
                        self.relay, self.port, other
                    ))),
                }
            }
            Err(_) => Err(Error::notify(format!(
                "Mail relay {}:{} did not complete delivery within {:?}",
                self.relay, self.port, self.timeout
            ))),
        }
    }

    fn notifier_name(&self) -> &'static str {
        "smtp"
    }
}

/// Run the SMTP dialogue for one message over an established stream
async fn submit<S>(stream: S, helo_name: &str, from: &str, to: &str, payload: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    expect(&read_reply(&mut reader).await?, &[220], "greeting")?;

    let ehlo = command(&mut reader, &mut writer, &format!("EHLO {}", helo_name)).await?;
    if ehlo.is_permanent_failure() {
        tracing::debug!("Relay rejected EHLO ({}), falling back to HELO", ehlo.code);
        let helo = command(&mut reader, &mut writer, &format!("HELO {}", helo_name)).await?;
        expect(&helo, &[250], "HELO")?;
    } else {
        expect(&ehlo, &[250], "EHLO")?;
    }

    let reply = command(&mut reader, &mut writer, &format!("MAIL FROM:<{}>", from)).await?;
    expect(&reply, &[250], "MAIL FROM")?;

    let reply = command(&mut reader, &mut writer, &format!("RCPT TO:<{}>", to)).await?;
    expect(&reply, &[250, 251], "RCPT TO")?;

    let reply = command(&mut reader, &mut writer, "DATA").await?;
    expect(&reply, &[354], "DATA")?;

    writer.write_all(payload.as_bytes()).await?;
    let reply = command(&mut reader, &mut writer, ".").await?;
    expect(&reply, &[250], "message submission")?;

    // Delivery is accepted at this point; a sloppy QUIT is not a failure
    if let Err(e) = command(&mut reader, &mut writer, "QUIT").await {
        tracing::debug!("Ignoring error after QUIT: {}", e);
    }

    Ok(())
}

/// Send one command line and read the reply
async fn command<R, W>(reader: &mut R, writer: &mut W, line: &str) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    read_reply(reader).await
}

/// Read a complete reply, following `NNN-` continuation lines
async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines: Vec<String> = Vec::new();

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(Error::notify("Mail relay closed the connection"));
        }
        let line = line.trim_end_matches(['\r', '\n']);

        let code = line
            .get(..3)
            .filter(|c| c.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| Error::notify(format!("Malformed reply from mail relay: {:?}", line)))?;

        let more = line.as_bytes().get(3) == Some(&b'-');
        lines.push(line.get(4..).unwrap_or("").to_string());

        if !more {
            return Ok(Reply {
                code,
                text: lines.join(" "),
            });
        }
    }
}

fn expect(reply: &Reply, accepted: &[u16], stage: &str) -> Result<()> {
    if accepted.contains(&reply.code) {
        Ok(())
    } else {
        Err(Error::notify(format!(
            "{} rejected by mail relay: {} {}",
            stage, reply.code, reply.text
        )))
    }
}
