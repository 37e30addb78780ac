use crate::event::Event;
use std::sync::mpsc::SyncSender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Feeds a [`Event::Tick`] into the aggregator channel at a fixed interval.
///
/// Ticks missed while the aggregator was busy are dropped rather than
/// delivered in a burst.
pub struct ProgressReporter {
    interval: Duration,
    events: SyncSender<Event>,
}

impl ProgressReporter {
    pub fn new(interval: Duration, events: SyncSender<Event>) -> Self {
        Self { interval, events }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("progress".to_string())
            .spawn(move || self.run())
    }

    /// Ticks until the receiving side is dropped.
    pub fn run(self) {
        let mut next = Instant::now() + self.interval;
        loop {
            thread::sleep(next.saturating_duration_since(Instant::now()));
            if self.events.send(Event::Tick).is_err() {
                return;
            }
            next += self.interval;
            let now = Instant::now();
            if next < now {
                next = now + self.interval;
            }
        }
    }
}
