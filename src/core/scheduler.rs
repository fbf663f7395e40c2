//! Poll scheduling with suspend/resume
//!
//! The scheduler only decides *when* a poll cycle should start. Arming the
//! actual timer is left to the instance loop, which re-arms whenever the
//! timer token changes; suspending or resuming bumps the token so a timer
//! armed before the transition can never fire afterwards.

use chrono::{DateTime, Utc};
use log::info;
use std::time::Duration;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Not started yet (initial delay pending, or polling disabled)
    Idle,
    /// Repeating timer armed
    Scheduled,
    /// Timer cancelled while the instance is hidden
    Suspended,
}

/// Repeating poll timer state for one instance
#[derive(Debug, Clone)]
pub struct PollScheduler {
    state: ScheduleState,
    poll_interval: Duration,
    last_successful_poll: DateTime<Utc>,
    timer_token: u64,
}

impl PollScheduler {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: ScheduleState::Idle,
            poll_interval,
            // Epoch keeps the staleness check defined before the first success
            last_successful_poll: DateTime::<Utc>::UNIX_EPOCH,
            timer_token: 0,
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn last_successful_poll(&self) -> DateTime<Utc> {
        self.last_successful_poll
    }

    /// Token of the timer that should currently be armed, if any
    pub fn timer_token(&self) -> Option<u64> {
        match self.state {
            ScheduleState::Scheduled => Some(self.timer_token),
            ScheduleState::Idle | ScheduleState::Suspended => None,
        }
    }

    /// Arm the repeating timer.
    ///
    /// Returns `true` when an immediate poll should be issued, which is only
    /// the case for the first start.
    pub fn start(&mut self) -> bool {
        if self.state != ScheduleState::Idle {
            return false;
        }
        self.state = ScheduleState::Scheduled;
        self.timer_token += 1;
        info!(
            "Update scheduled every {:.1} minutes",
            self.poll_interval.as_secs_f64() / 60.0
        );
        true
    }

    /// Cancel the repeating timer. In-flight polls are not affected.
    pub fn suspend(&mut self) {
        if self.state == ScheduleState::Scheduled {
            self.state = ScheduleState::Suspended;
            self.timer_token += 1;
        }
    }

    /// Re-arm the timer after a suspend.
    ///
    /// Returns `true` when the last successful poll is at least one interval
    /// old and an immediate catch-up poll should be issued.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != ScheduleState::Suspended {
            return false;
        }
        self.state = ScheduleState::Scheduled;
        self.timer_token += 1;
        self.is_stale(now)
    }

    /// Record the time of a successful poll
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.last_successful_poll = now;
    }

    /// Whether a full interval has passed since the last successful poll.
    ///
    /// An interval reaching past the representable range is never stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.poll_interval)
            .ok()
            .and_then(|interval| self.last_successful_poll.checked_add_signed(interval))
            .map_or(false, |due| now >= due)
    }
}
