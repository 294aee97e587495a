use std::fmt::Write as _;
use std::io::{self, Write};

use crate::stats::{RunStatistics, StageRate};

/// Single status line rewritten in place after every frame.
#[derive(Debug, Default)]
pub struct ProgressLine {
    prev_len: usize,
}

impl ProgressLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format_line(stats: &RunStatistics, decode: bool, encode: bool) -> String {
        let mut line = format!("F: {}", stats.frames);
        if decode {
            push_stage(&mut line, "Decompress", stats.decode_rate());
        }
        if encode {
            push_stage(&mut line, "Compress", stats.encode_rate());
        }
        line
    }

    /// Overwrites the previous line, padding with spaces when the new one is shorter.
    pub fn render<W: Write>(
        &mut self,
        out: &mut W,
        stats: &RunStatistics,
        decode: bool,
        encode: bool,
    ) -> io::Result<()> {
        let line = Self::format_line(stats, decode, encode);
        write!(out, "\r{}", line)?;
        if line.len() < self.prev_len {
            write!(out, "{:width$}", "", width = self.prev_len - line.len())?;
        }
        self.prev_len = line.len();
        out.flush()
    }

    /// Ends the line.
    pub fn finish<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.prev_len = 0;
        writeln!(out)?;
        out.flush()
    }
}

fn push_stage(line: &mut String, label: &str, rate: StageRate) {
    let _ = write!(
        line,
        " | {}: {:.1} fps ({:.1} MiB/s) (ratio: {:.2})",
        label, rate.fps, rate.mib_per_sec, rate.ratio
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_lists_active_stages() {
        let mut stats = RunStatistics::new();
        stats.record(10, 30, 15);

        assert_eq!(ProgressLine::format_line(&stats, false, false), "F: 1");
        assert_eq!(
            ProgressLine::format_line(&stats, true, false),
            "F: 1 | Decompress: 0.0 fps (0.0 MiB/s) (ratio: 3.00)"
        );
        assert_eq!(
            ProgressLine::format_line(&stats, false, true),
            "F: 1 | Compress: 0.0 fps (0.0 MiB/s) (ratio: 2.00)"
        );
    }

    #[test]
    fn test_shorter_line_is_padded() -> anyhow::Result<()> {
        let mut progress = ProgressLine::new();
        let mut out = Vec::new();
        let mut stats = RunStatistics::new();
        stats.frames = 1000;
        progress.render(&mut out, &stats, false, false)?;
        stats.frames = 7;
        progress.render(&mut out, &stats, false, false)?;
        progress.finish(&mut out)?;

        assert_eq!(String::from_utf8(out)?, "\rF: 1000\rF: 7   \n");
        Ok(())
    }
}
