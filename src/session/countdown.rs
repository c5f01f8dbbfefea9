// src/session/countdown.rs

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::session::ports::{Scheduler, TimerId};

/// What a delivered tick meant to the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// Still running; carries the recomputed remaining time.
    Running(Duration),
    /// Reached zero on this tick. Reported once per deadline.
    Expired,
    /// The tick belongs to a timer this countdown no longer owns.
    Stale,
}

/// `max(0, deadline - now)`, floored to whole milliseconds.
pub fn remaining_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

/// Time remaining to a deadline, driven by one repeating timer.
///
/// Restarting with a new deadline cancels the previous timer first, so a
/// countdown never owns more than one timer and never reports expiry for a
/// deadline it has moved away from.
#[derive(Debug, Default)]
pub struct Countdown {
    deadline: Option<DateTime<Utc>>,
    timer: Option<TimerId>,
    remaining: Duration,
    expired: bool,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &mut self,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
        period: Duration,
        scheduler: &mut dyn Scheduler,
    ) {
        self.stop(scheduler);
        self.deadline = Some(deadline);
        self.remaining = remaining_until(deadline, now);
        self.expired = false;
        self.timer = Some(scheduler.schedule_repeating(period));
    }

    pub fn stop(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(id) = self.timer.take() {
            scheduler.cancel(id);
        }
    }

    pub fn owns(&self, id: TimerId) -> bool {
        self.timer == Some(id)
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn tick(&mut self, id: TimerId, now: DateTime<Utc>, scheduler: &mut dyn Scheduler) -> CountdownTick {
        if !self.owns(id) || self.expired {
            return CountdownTick::Stale;
        }
        let Some(deadline) = self.deadline else {
            return CountdownTick::Stale;
        };

        // A clock stepping backwards must not make the display count up.
        self.remaining = remaining_until(deadline, now).min(self.remaining);

        if self.remaining.is_zero() {
            self.expired = true;
            self.stop(scheduler);
            CountdownTick::Expired
        } else {
            CountdownTick::Running(self.remaining)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ports::{Clock, ManualClock, ManualScheduler};

    const SECOND: Duration = Duration::from_secs(1);

    fn t0() -> DateTime<Utc> {
        "2026-03-01T09:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_counts_down_to_zero_and_expires_once() {
        let clock = ManualClock::new(t0());
        let mut sched = ManualScheduler::new(clock.clone());
        let mut countdown = Countdown::new();
        countdown.start(t0() + chrono::Duration::seconds(3), clock.now(), SECOND, &mut sched);
        assert_eq!(countdown.remaining(), Duration::from_secs(3));

        let mut seen = Vec::new();
        let mut expiries = 0;
        while let Some(id) = sched.pop_due(t0() + chrono::Duration::seconds(10)) {
            match countdown.tick(id, clock.now(), &mut sched) {
                CountdownTick::Running(left) => seen.push(left),
                CountdownTick::Expired => expiries += 1,
                CountdownTick::Stale => panic!("unexpected stale tick"),
            }
        }

        assert_eq!(seen, vec![Duration::from_secs(2), Duration::from_secs(1)]);
        assert!(seen.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(expiries, 1);
        assert_eq!(countdown.remaining(), Duration::ZERO);
        assert!(!countdown.is_running());
        assert_eq!(sched.active(), 0);
    }

    #[test]
    fn test_restart_cancels_previous_timer() {
        let clock = ManualClock::new(t0());
        let mut sched = ManualScheduler::new(clock.clone());
        let mut countdown = Countdown::new();

        countdown.start(t0() + chrono::Duration::seconds(2), clock.now(), SECOND, &mut sched);
        let first = sched.pop_due(t0() + chrono::Duration::seconds(1)).unwrap();
        assert_eq!(countdown.tick(first, clock.now(), &mut sched), CountdownTick::Running(SECOND));

        // Retarget before the old deadline passes.
        countdown.start(clock.now() + chrono::Duration::seconds(5), clock.now(), SECOND, &mut sched);
        assert!(!sched.is_active(first));
        assert_eq!(sched.active(), 1);

        // A tick from the old timer that was already queued is ignored.
        assert_eq!(countdown.tick(first, clock.now(), &mut sched), CountdownTick::Stale);

        let mut expiries = 0;
        while let Some(id) = sched.pop_due(t0() + chrono::Duration::seconds(30)) {
            if countdown.tick(id, clock.now(), &mut sched) == CountdownTick::Expired {
                expiries += 1;
                assert_eq!(clock.now(), t0() + chrono::Duration::seconds(6));
            }
        }
        assert_eq!(expiries, 1);
    }

    #[test]
    fn test_backwards_clock_does_not_increase_remaining() {
        let clock = ManualClock::new(t0());
        let mut sched = ManualScheduler::new(clock.clone());
        let mut countdown = Countdown::new();
        countdown.start(t0() + chrono::Duration::seconds(10), clock.now(), SECOND, &mut sched);

        let id = sched.pop_due(t0() + chrono::Duration::seconds(1)).unwrap();
        countdown.tick(id, clock.now(), &mut sched);
        clock.set(t0() - chrono::Duration::seconds(30));
        assert_eq!(
            countdown.tick(id, clock.now(), &mut sched),
            CountdownTick::Running(Duration::from_secs(9))
        );
    }

    #[test]
    fn test_past_deadline_expires_on_first_tick() {
        let clock = ManualClock::new(t0());
        let mut sched = ManualScheduler::new(clock.clone());
        let mut countdown = Countdown::new();
        countdown.start(t0() - chrono::Duration::seconds(5), clock.now(), SECOND, &mut sched);
        assert_eq!(countdown.remaining(), Duration::ZERO);

        let id = sched.pop_due(t0() + chrono::Duration::seconds(1)).unwrap();
        assert_eq!(countdown.tick(id, clock.now(), &mut sched), CountdownTick::Expired);
        assert_eq!(countdown.tick(id, clock.now(), &mut sched), CountdownTick::Stale);
    }
}
