use std::time::Duration;

use tokio::{
    sync::mpsc::Receiver,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::trace;

use crate::{stats::Samples, Process};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// What a connection worker reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Response {
        status: u16,
        bytes: usize,
        latency: Duration,
    },
    Error,
}

#[derive(Default)]
struct Bucket {
    requests: u64,
    bytes: u64,
}

impl Samples {
    fn record(&mut self, event: Event, bucket: &mut Bucket) {
        match event {
            Event::Response {
                status,
                bytes,
                latency,
            } => {
                bucket.requests += 1;
                bucket.bytes += bytes as u64;
                self.total_requests += 1;
                self.total_bytes += bytes as u64;
                let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
                self.latencies.saturating_record(micros);
                self.status_codes.record(status);
            }
            Event::Error => self.errors += 1,
        }
    }

    fn close_bucket(&mut self, bucket: &mut Bucket) {
        let Bucket { requests, bytes } = std::mem::take(bucket);
        trace!(requests, bytes, "closing sample");
        self.requests_per_second.push(requests);
        self.bytes_per_second.push(bytes);
    }
}

/// Collects worker events into one sample per second until `duration` has
/// elapsed since `start`, or every worker has hung up.
pub(crate) async fn collect(
    mut events: Receiver<Event>,
    mut samples: Samples,
    start: Instant,
    duration: Duration,
    process: &dyn Process,
) -> Samples {
    let seconds = duration.as_secs() as usize;
    let mut bucket = Bucket::default();
    let mut ticker = interval_at(start + SAMPLE_INTERVAL, SAMPLE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                samples.close_bucket(&mut bucket);
                process.inc();
                if samples.requests_per_second.len() >= seconds {
                    break;
                }
            }
            event = events.recv() => match event {
                Some(event) => samples.record(event, &mut bucket),
                None => {
                    // workers stop right at the deadline, possibly before the last tick
                    if samples.requests_per_second.len() < seconds {
                        samples.close_bucket(&mut bucket);
                        process.inc();
                    }
                    break;
                }
            },
        }
    }

    process.finish();
    samples
}
