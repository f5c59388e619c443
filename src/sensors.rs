//! Line-oriented live sample source.
//!
//! Each line is `kind,x,y,z,timestamp_ms` where `kind` is one of
//! `accelerometer`, `magnetometer`, `gravity` or `rotation`. Blank lines and
//! lines starting with `#` are ignored.

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;

use crate::error::{Result, StepError};
use crate::types::{SensorKind, SensorSample};

/// Parse one input line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<SensorSample>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let malformed = |reason: String| StepError::MalformedSample {
        key: line.to_string(),
        reason,
    };

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() != 5 {
        return Err(malformed(format!("expected 5 fields, got {}", parts.len())));
    }

    let kind: SensorKind = parts[0].parse().map_err(malformed)?;
    let mut axes = [0.0; 3];
    for (slot, text) in axes.iter_mut().zip(&parts[1..4]) {
        *slot = match text.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => return Err(malformed(format!("bad value '{}'", text))),
        };
    }
    let timestamp_ms = parts[4]
        .parse::<i64>()
        .map_err(|_| malformed(format!("bad timestamp '{}'", parts[4])))?;

    Ok(Some(SensorSample::new(kind, axes[0], axes[1], axes[2], timestamp_ms)))
}

/// Forward parsed samples from `reader` until EOF or until the receiver is
/// dropped. A full channel suspends reading, so no sample is lost. Returns the
/// number of samples delivered.
pub async fn line_loop<R>(reader: R, tx: Sender<SensorSample>) -> u64
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sample_count = 0u64;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("[input] read error: {}", e);
                break;
            }
        };

        let sample = match parse_line(&line) {
            Ok(Some(sample)) => sample,
            Ok(None) => continue,
            Err(e) => {
                warn!("[input] {}", e);
                continue;
            }
        };

        if tx.send(sample).await.is_err() {
            info!("[input] Channel closed after {} samples", sample_count);
            break;
        }
        sample_count += 1;
        if sample_count % 500 == 0 {
            debug!("[input] {} samples", sample_count);
        }
    }

    info!("[input] end of input after {} samples", sample_count);
    sample_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let sample = parse_line("accelerometer, 0.1, -0.2, 9.81, 1700000000020")
            .unwrap()
            .unwrap();
        assert_eq!(sample.kind, SensorKind::Accelerometer);
        assert_eq!(sample.z, 9.81);
        assert_eq!(sample.timestamp_ms, 1_700_000_000_020);

        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# header").unwrap().is_none());
        assert!(matches!(
            parse_line("gyroscope,0,0,0,1"),
            Err(StepError::MalformedSample { .. })
        ));
        assert!(parse_line("mag,1,2,NaN,5").is_err());
        assert!(parse_line("mag,1,2,3").is_err());
    }

    #[tokio::test]
    async fn test_line_loop_forwards_valid_samples() {
        let input = "accel,0,0,9.8,0\nbad line\n\ngravity,0,0,9.81,10\naccel,0,0,10.1,20\n";
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let sent = line_loop(input.as_bytes(), tx).await;
        assert_eq!(sent, 3);

        let mut kinds = Vec::new();
        while let Some(sample) = rx.recv().await {
            kinds.push(sample.kind);
        }
        assert_eq!(
            kinds,
            vec![SensorKind::Accelerometer, SensorKind::Gravity, SensorKind::Accelerometer]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_line_loop_waits_for_slow_consumer() {
        let input: String = (0..5_000)
            .map(|i| format!("accel,0,0,{},{}\n", 9.8 + (i % 7) as f64, i * 20))
            .collect();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let reader = tokio::spawn(async move { line_loop(input.as_bytes(), tx).await });

        let mut received = Vec::new();
        while let Some(sample) = rx.recv().await {
            if received.len() % 100 == 0 {
                tokio::task::yield_now().await;
            }
            received.push(sample.timestamp_ms);
        }

        assert_eq!(reader.await.unwrap(), 5_000);
        let expected: Vec<i64> = (0..5_000).map(|i| i * 20).collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_line_loop_stops_when_receiver_dropped() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);
        assert_eq!(line_loop("accel,0,0,1,0\naccel,0,0,2,1\n".as_bytes(), tx).await, 0);
    }
}
