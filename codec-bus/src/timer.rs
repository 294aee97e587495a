use std::time::{Duration, Instant};

/// Accumulates the time spent inside `begin`/`end` brackets.
#[derive(Debug, Default)]
pub struct Timer {
    start: Option<Instant>,
    total: Duration,
    samples: u64,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        self.start = Some(Instant::now());
    }

    /// Closes the current bracket. An `end` without a matching `begin` is ignored.
    pub fn end(&mut self) {
        if let Some(start) = self.start.take() {
            self.total += start.elapsed();
            self.samples += 1;
        }
    }

    /// Runs `f` inside one bracket.
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        self.begin();
        let out = f();
        self.end();
        out
    }

    pub fn elapsed(&self) -> Duration {
        self.total
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.total.as_micros() as u64
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brackets_accumulate() {
        let mut timer = Timer::new();
        assert_eq!(timer.elapsed_micros(), 0);

        timer.begin();
        std::thread::sleep(Duration::from_millis(2));
        timer.end();
        let first = timer.elapsed_micros();
        assert!(first >= 2_000);

        timer.time(|| std::thread::sleep(Duration::from_millis(2)));
        assert!(timer.elapsed_micros() >= first + 2_000);
        assert_eq!(timer.samples(), 2);
    }

    #[test]
    fn test_unmatched_end_is_ignored() {
        let mut timer = Timer::new();
        timer.end();
        assert_eq!(timer.samples(), 0);
        assert_eq!(timer.elapsed(), Duration::ZERO);
    }
}
