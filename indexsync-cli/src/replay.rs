//! Replay newline-delimited event logs through a dispatcher

use crossbeam_channel::{bounded, Sender};
use indexsync_core::{Dispatcher, EventRecord, Outcome, SessionFactory};
use serde::Serialize;
use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Dispatch on the reading thread, in file order
    pub sequential: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub records: u64,
    pub handled: u64,
    pub ignored: u64,
    pub unrecognized: u64,
    pub failed: u64,
    pub malformed: u64,
}

#[derive(Default)]
struct Tally {
    handled: AtomicU64,
    ignored: AtomicU64,
    unrecognized: AtomicU64,
    failed: AtomicU64,
}

impl Tally {
    fn record(&self, line: usize, routing_key: &str, result: indexsync_core::Result<Outcome>) {
        let counter = match result {
            Ok(Outcome::Handled) => &self.handled,
            Ok(Outcome::Ignored) => &self.ignored,
            Ok(Outcome::Unrecognized) => &self.unrecognized,
            Err(err) => {
                tracing::error!(line, routing_key, error = %err, "event failed");
                &self.failed
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

enum Line {
    Blank,
    Malformed,
    Record(EventRecord),
}

fn parse_line(number: usize, line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Line::Blank;
    }
    match serde_json::from_str(line) {
        Ok(record) => Line::Record(record),
        Err(err) => {
            tracing::warn!(line = number, error = %err, "skipping malformed record");
            Line::Malformed
        }
    }
}

/// Read records and hand them to the workers. Returns (records, malformed).
/// The sender is dropped on return, which lets the workers drain and exit.
fn feed(input: impl BufRead, tx: Sender<(usize, EventRecord)>) -> indexsync_core::Result<(u64, u64)> {
    let mut records = 0;
    let mut malformed = 0;
    for (idx, line) in input.lines().enumerate() {
        match parse_line(idx + 1, &line?) {
            Line::Blank => {}
            Line::Malformed => malformed += 1,
            Line::Record(record) => {
                records += 1;
                if tx.send((idx + 1, record)).is_err() {
                    break;
                }
            }
        }
    }
    Ok((records, malformed))
}

/// Dispatch every record in `input`. Individual event failures are counted,
/// not returned; only read errors abort the replay.
pub fn replay<F: SessionFactory>(
    dispatcher: &Dispatcher<F>,
    input: impl BufRead,
    options: ReplayOptions,
) -> indexsync_core::Result<ReplaySummary> {
    let tally = Tally::default();
    let workers = options.workers.max(1);

    let (records, malformed) = if options.sequential || workers == 1 {
        let mut records = 0;
        let mut malformed = 0;
        for (idx, line) in input.lines().enumerate() {
            match parse_line(idx + 1, &line?) {
                Line::Blank => {}
                Line::Malformed => malformed += 1,
                Line::Record(record) => {
                    records += 1;
                    let result = dispatcher.consume(&record.routing_key, &record.event);
                    tally.record(idx + 1, &record.routing_key, result);
                }
            }
        }
        (records, malformed)
    } else {
        let (tx, rx) = bounded::<(usize, EventRecord)>(options.queue_capacity.max(1));
        let tally_ref = &tally;

        std::thread::scope(|s| {
            for _ in 0..workers {
                let rx = rx.clone();
                s.spawn(move || {
                    for (line, record) in rx.iter() {
                        let result = dispatcher.consume(&record.routing_key, &record.event);
                        tally_ref.record(line, &record.routing_key, result);
                    }
                });
            }
            drop(rx);
            feed(input, tx)
        })?
    };

    Ok(ReplaySummary {
        records,
        handled: tally.handled.load(Ordering::Relaxed),
        ignored: tally.ignored.load(Ordering::Relaxed),
        unrecognized: tally.unrecognized.load(Ordering::Relaxed),
        failed: tally.failed.load(Ordering::Relaxed),
        malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexsync_core::config::RepositoryConfig;
    use indexsync_core::{DocumentStore, MemoryRepository, SqliteStore, TypeCollection};
    use std::io::Cursor;
    use std::sync::Arc;

    fn setup() -> (Arc<SqliteStore>, Dispatcher<MemoryRepository>) {
        let repo = MemoryRepository::new();
        repo.add_collection("/z", "rods", 1_000)
            .add_collection("/z/home", "rods", 1_000);
        for i in 0..6 {
            repo.add_data_object(&format!("/z/home/f{}.txt", i), "alice", i, "text", 2_000);
        }
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new(repo, RepositoryConfig::default(), store.clone());
        (store, dispatcher)
    }

    fn log() -> String {
        let mut lines = Vec::new();
        for i in 0..6 {
            lines.push(format!(
                r#"{{"routing_key": "data-object.metadata.add", "event": {{"entity": "/z/home/f{}.txt"}}}}"#,
                i
            ));
        }
        lines.push(r#"{"routing_key": "foo.bar", "event": {"entity": "/z"}}"#.to_string());
        lines.push(r#"{"routing_key": "zone.mv", "payload": {"entity": "/z"}}"#.to_string());
        lines.push(r#"{"routing_key": "data-object.rm", "event": {}}"#.to_string());
        lines.push("not json".to_string());
        lines.push(String::new());
        lines.push("# comment".to_string());
        lines.join("\n")
    }

    fn expected() -> ReplaySummary {
        ReplaySummary {
            records: 9,
            handled: 6,
            ignored: 1,
            unrecognized: 1,
            failed: 1,
            malformed: 1,
        }
    }

    #[test]
    fn sequential_replay_counts_outcomes() {
        let (store, dispatcher) = setup();
        let options = ReplayOptions {
            workers: 4,
            queue_capacity: 2,
            sequential: true,
        };
        let summary = replay(&dispatcher, Cursor::new(log()), options).unwrap();
        assert_eq!(summary, expected());
        assert_eq!(store.count(TypeCollection::File).unwrap(), 6);
    }

    #[test]
    fn worker_pool_replay_matches_sequential() {
        let (store, dispatcher) = setup();
        let options = ReplayOptions {
            workers: 3,
            queue_capacity: 2,
            sequential: false,
        };
        let summary = replay(&dispatcher, Cursor::new(log()), options).unwrap();
        assert_eq!(summary, expected());
        assert_eq!(store.count(TypeCollection::File).unwrap(), 6);
    }
}
