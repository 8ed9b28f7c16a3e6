use std::time::Duration;
use tokio::time::Instant;

/// Minimum delay between two resend requests for the same code.
pub const RESEND_COOLDOWN: Duration = Duration::from_secs(60);

/// Tracks when a one-time code may be resent.
#[derive(Debug, Clone)]
pub struct ResendCooldown {
    period: Duration,
    last_sent: Option<Instant>,
}

impl Default for ResendCooldown {
    fn default() -> Self {
        Self::new(RESEND_COOLDOWN)
    }
}

impl ResendCooldown {
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            last_sent: None,
        }
    }

    /// Time left before the next resend is allowed; zero when ready.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.last_sent.map_or(Duration::ZERO, |sent| {
            self.period.saturating_sub(sent.elapsed())
        })
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Starts a new cooldown window.
    pub fn mark_sent(&mut self) {
        self.last_sent = Some(Instant::now());
    }
}
