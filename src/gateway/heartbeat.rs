use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Tracks the heartbeat cadence for one connection: the server-dictated
/// timer plus the missed-ACK counter used for zombie detection.
///
/// The timer is armed by HELLO and dies with the connection's select loop,
/// so a torn-down connection can never heartbeat a dead or replaced socket.
pub(crate) struct Heartbeat {
    timer: Option<Interval>,
    acked: bool,
    missed: u32,
    max_missed: u32,
}

impl Heartbeat {
    pub fn new(max_missed: u32) -> Self {
        Self {
            timer: None,
            acked: true,
            missed: 0,
            max_missed,
        }
    }

    /// Arm the recurring timer at the server-supplied interval. The first
    /// tick fires one full interval from now; the immediate post-HELLO
    /// heartbeat is sent separately by the session loop.
    pub fn start(&mut self, interval_ms: u64) {
        let period = Duration::from_millis(interval_ms.max(1));
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    /// Waits for the next scheduled heartbeat; pends forever until HELLO has
    /// armed the timer.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Registers an outgoing heartbeat. Returns true once the configured
    /// number of consecutive beats have gone unacknowledged, at which point
    /// the connection must be treated as a zombie.
    pub fn beat(&mut self) -> bool {
        if self.acked {
            self.missed = 0;
        } else {
            self.missed += 1;
        }
        self.acked = false;
        self.missed >= self.max_missed
    }

    /// Registers a HEARTBEAT_ACK from the server.
    pub fn ack(&mut self) {
        self.acked = true;
        self.missed = 0;
    }
}
