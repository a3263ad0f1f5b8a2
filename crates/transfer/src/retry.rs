use std::time::Duration;

/// Fixed backoff table for a single upload request.
///
/// Entry `n` is the delay before attempt `n + 1`. The request is attempted
/// once per entry and then abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl Default for RetrySchedule {
    /// Immediate, then 2 s, 5 s, 10 s and 20 s: five attempts in total.
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20),
            ],
        }
    }
}

impl RetrySchedule {
    /// Creates a schedule from explicit delays.
    ///
    /// An empty table means a single immediate attempt.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// A schedule that never retries.
    pub fn no_retry() -> Self {
        Self::new(vec![Duration::ZERO])
    }

    /// Total number of attempts per request.
    pub fn attempts(&self) -> usize {
        self.delays.len().max(1)
    }

    /// Delay before the given attempt (1-based), or `None` past the end.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        if attempt == 0 || attempt > self.attempts() {
            return None;
        }
        Some(self.delays.get(attempt - 1).copied().unwrap_or_default())
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule() {
        let schedule = RetrySchedule::default();
        assert_eq!(schedule.attempts(), 5);
        let expected = [0, 2, 5, 10, 20];
        for (i, &secs) in expected.iter().enumerate() {
            assert_eq!(
                schedule.delay_for_attempt(i + 1),
                Some(Duration::from_secs(secs)),
                "attempt {}",
                i + 1
            );
        }
        assert_eq!(schedule.delay_for_attempt(6), None);
    }

    #[test]
    fn attempt_zero_is_invalid() {
        assert_eq!(RetrySchedule::default().delay_for_attempt(0), None);
    }

    #[test]
    fn empty_schedule_allows_one_attempt() {
        let schedule = RetrySchedule::new(Vec::new());
        assert_eq!(schedule.attempts(), 1);
        assert_eq!(schedule.delay_for_attempt(1), Some(Duration::ZERO));
        assert_eq!(schedule.delay_for_attempt(2), None);
    }

    #[test]
    fn no_retry_schedule() {
        let schedule = RetrySchedule::no_retry();
        assert_eq!(schedule.attempts(), 1);
        assert_eq!(schedule.delays(), &[Duration::ZERO]);
    }
}
