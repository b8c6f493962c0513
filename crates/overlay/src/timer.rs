//! Elapsed-time ticker for the recording HUD

use std::time::Duration;

/// Format an elapsed duration as `mm:ss`, switching to `hh:mm:ss` at one hour.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Whole-second accumulator driven by the HUD's tick messages.
#[derive(Debug, Default)]
pub struct RecordingTimer {
    elapsed: Duration,
}

impl RecordingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    pub fn tick(&mut self) {
        self.elapsed += Duration::from_secs(1);
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn display(&self) -> String {
        format_elapsed(self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sessions_use_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00");
        assert_eq!(format_elapsed(Duration::from_secs(7)), "00:07");
        assert_eq!(format_elapsed(Duration::from_secs(59 * 60 + 59)), "59:59");
    }

    #[test]
    fn hour_long_sessions_grow_an_hours_field() {
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "01:00:00");
        assert_eq!(
            format_elapsed(Duration::from_secs(2 * 3600 + 5 * 60 + 3)),
            "02:05:03"
        );
    }

    #[test]
    fn ticks_accumulate_and_reset() {
        let mut timer = RecordingTimer::new();
        for _ in 0..61 {
            timer.tick();
        }
        assert_eq!(timer.display(), "01:01");
        timer.reset();
        assert_eq!(timer.display(), "00:00");
    }
}
