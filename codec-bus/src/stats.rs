use serde::{Deserialize, Serialize};

use crate::timer::Timer;

const MIB: f64 = 1024.0 * 1024.0;

/// Cumulative counters of one run. Rates are always derived from the totals,
/// so they average over the whole run.
#[derive(Debug, Default)]
pub struct RunStatistics {
    pub frames: u64,
    /// Bytes read from the input, before decoding.
    pub input_bytes: u64,
    /// Bytes after the decode stage (equal to `input_bytes` without one).
    pub decoded_bytes: u64,
    /// Bytes after the encode stage (equal to `decoded_bytes` without one).
    pub output_bytes: u64,
    pub decode_timer: Timer,
    pub encode_timer: Timer,
}

/// Throughput of one transformation stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageRate {
    pub fps: f64,
    pub mib_per_sec: f64,
    pub ratio: f64,
    pub elapsed_us: u64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, input: usize, decoded: usize, output: usize) {
        self.frames += 1;
        self.input_bytes += input as u64;
        self.decoded_bytes += decoded as u64;
        self.output_bytes += output as u64;
    }

    /// Decode stage figures; the ratio is decoded over input bytes.
    pub fn decode_rate(&self) -> StageRate {
        self.stage_rate(&self.decode_timer, self.input_bytes)
    }

    /// Encode stage figures; the ratio is decoded over output bytes.
    pub fn encode_rate(&self) -> StageRate {
        self.stage_rate(&self.encode_timer, self.output_bytes)
    }

    fn stage_rate(&self, timer: &Timer, ratio_base: u64) -> StageRate {
        let elapsed_us = timer.elapsed_micros();
        let (fps, mib_per_sec) = if elapsed_us == 0 {
            (0.0, 0.0)
        } else {
            let secs = elapsed_us as f64 / 1_000_000.0;
            (
                self.frames as f64 / secs,
                self.decoded_bytes as f64 / MIB / secs,
            )
        };
        let ratio = if ratio_base == 0 {
            0.0
        } else {
            self.decoded_bytes as f64 / ratio_base as f64
        };
        StageRate {
            fps,
            mib_per_sec,
            ratio,
            elapsed_us,
        }
    }
}

/// Final figures of a run, suitable for persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames: u64,
    pub input_bytes: u64,
    pub decoded_bytes: u64,
    pub output_bytes: u64,
    pub decode: Option<StageRate>,
    pub encode: Option<StageRate>,
    pub interrupted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_without_time_are_zero() {
        let mut stats = RunStatistics::new();
        stats.record(10, 40, 5);
        let decode = stats.decode_rate();
        assert_eq!(decode.fps, 0.0);
        assert_eq!(decode.mib_per_sec, 0.0);
        assert_eq!(decode.ratio, 4.0);
        assert_eq!(stats.encode_rate().ratio, 8.0);
    }

    #[test]
    fn test_totals_accumulate() {
        let mut stats = RunStatistics::new();
        for _ in 0..3 {
            stats.record(100, 300, 30);
        }
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.input_bytes, 300);
        assert_eq!(stats.decoded_bytes, 900);
        assert_eq!(stats.output_bytes, 90);
    }

    #[test]
    fn test_empty_run_has_zero_ratio() {
        let stats = RunStatistics::new();
        assert_eq!(stats.decode_rate().ratio, 0.0);
        assert_eq!(stats.encode_rate().ratio, 0.0);
    }

    #[test]
    fn test_summary_serializes() -> anyhow::Result<()> {
        let summary = RunSummary {
            frames: 2,
            input_bytes: 48,
            decoded_bytes: 48,
            output_bytes: 48,
            decode: None,
            encode: Some(StageRate {
                fps: 10.0,
                mib_per_sec: 1.5,
                ratio: 1.0,
                elapsed_us: 200_000,
            }),
            interrupted: false,
        };
        let json = serde_json::to_string(&summary)?;
        assert!(json.contains("\"frames\":2"));
        assert!(json.contains("\"decode\":null"));
        let back: RunSummary = serde_json::from_str(&json)?;
        assert_eq!(back, summary);
        Ok(())
    }
}
