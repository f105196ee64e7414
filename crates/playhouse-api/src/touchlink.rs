// Touchlink reset over the bridge's raw control port
//
// Plain ASCII, newline-terminated. The bridge echoes the command, then
// reports the outcome on a second line once the nearby bulb answered (or
// gave up). Every step has its own deadline; the stream is dropped on
// return, whichever path that is.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::Error;

const COMMAND: &str = "[Link,Touchlink]";

/// Control port and per-step deadlines.
#[derive(Debug, Clone)]
pub struct TouchlinkConfig {
    pub port: u16,
    /// Deadline for connect, write and the echo line.
    pub step_timeout: Duration,
    /// Deadline for the result line; pairing takes far longer than an echo.
    pub result_timeout: Duration,
}

impl Default for TouchlinkConfig {
    fn default() -> Self {
        Self {
            port: 30000,
            step_timeout: Duration::from_secs(5),
            result_timeout: Duration::from_secs(30),
        }
    }
}

/// Network identity of the bulb that was re-paired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetBulb {
    pub nwk_addr: String,
    pub pan: String,
}

/// Run one Touchlink exchange against `host`.
pub async fn reset_nearby_bulb(host: &str, config: &TouchlinkConfig) -> Result<ResetBulb, Error> {
    info!(host, port = config.port, "touchlink reset started");
    let result = exchange(host, config).await;
    match &result {
        Ok(bulb) => info!(host, nwk_addr = %bulb.nwk_addr, pan = %bulb.pan, "bulb reset"),
        Err(e) => warn!(host, error = %e, "touchlink reset failed"),
    }
    result
}

async fn exchange(host: &str, config: &TouchlinkConfig) -> Result<ResetBulb, Error> {
    let stream = step("connect", config.step_timeout, async {
        TcpStream::connect((host, config.port)).await
    })
    .await?;
    let mut stream = BufReader::new(stream);

    step("write", config.step_timeout, async {
        let line = format!("{COMMAND}\n");
        stream.get_mut().write_all(line.as_bytes()).await?;
        stream.get_mut().flush().await
    })
    .await?;

    let echo = read_line(&mut stream, "echo", config.step_timeout).await?;
    if echo != COMMAND {
        return Err(not_completed(format!("unexpected echo {echo:?}")));
    }

    let result = read_line(&mut stream, "result", config.result_timeout).await?;
    debug!(line = %result, "touchlink result");
    parse_result(&result)
}

async fn read_line(
    stream: &mut BufReader<TcpStream>,
    what: &'static str,
    limit: Duration,
) -> Result<String, Error> {
    let mut line = String::new();
    let read = step(what, limit, stream.read_line(&mut line)).await?;
    if read == 0 {
        return Err(not_completed(format!("connection closed before {what} line")));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

async fn step<T>(
    what: &'static str,
    limit: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T, Error> {
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(not_completed(format!("{what} failed: {e}"))),
        Err(_) => Err(not_completed(format!("{what} timed out after {limit:?}"))),
    }
}

/// Parse `[Link,Touchlink,success,NwkAddr=AB12,pan=CD34]`.
fn parse_result(line: &str) -> Result<ResetBulb, Error> {
    if line.contains("failed") {
        return Err(not_completed("bridge reported failure"));
    }
    let Some((_, fields)) = line.split_once("success,") else {
        return Err(not_completed(format!("unrecognized result {line:?}")));
    };

    let mut nwk_addr = None;
    let mut pan = None;
    for field in fields.trim_end_matches(']').split(',') {
        match field.trim().split_once('=') {
            Some(("NwkAddr", v)) => nwk_addr = Some(v.to_owned()),
            Some(("pan", v)) => pan = Some(v.to_owned()),
            _ => {}
        }
    }

    match (nwk_addr, pan) {
        (Some(nwk_addr), Some(pan)) => Ok(ResetBulb { nwk_addr, pan }),
        _ => Err(not_completed(format!("result missing fields {line:?}"))),
    }
}

fn not_completed(reason: impl Into<String>) -> Error {
    Error::ResetNotCompleted {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_line() {
        let bulb = parse_result("[Link,Touchlink,success,NwkAddr=AB12,pan=CD34]").expect("ok");
        assert_eq!(
            bulb,
            ResetBulb {
                nwk_addr: "AB12".into(),
                pan: "CD34".into()
            }
        );
    }

    #[test]
    fn field_order_does_not_matter() {
        let bulb = parse_result("[Link,Touchlink,success,pan=0001,NwkAddr=ffff]").expect("ok");
        assert_eq!(bulb.nwk_addr, "ffff");
        assert_eq!(bulb.pan, "0001");
    }

    #[test]
    fn failed_line_is_not_completed() {
        let err = parse_result("[Link,Touchlink,failed]").expect_err("must fail");
        assert!(matches!(err, Error::ResetNotCompleted { .. }));
    }

    #[test]
    fn garbage_and_missing_fields_are_not_completed() {
        assert!(parse_result("hello").is_err());
        assert!(parse_result("[Link,Touchlink,success,NwkAddr=AB12]").is_err());
    }
}
