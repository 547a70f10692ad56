/*!
 * pollseq demo
 *
 * One owner thread mutates a shared table and bumps its sequence number;
 * observer threads sleep in a blocking wait until the number moves. When the
 * owner is done it destroys the sequence number, which wakes every observer
 * one last time.
 */

use miette::{miette, IntoDiagnostic};
use parking_lot::RwLock;
use pollseq::{init_tracing, poll, PollError, PollResult, Seq};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const OBSERVERS: usize = 3;
const UPDATES: u64 = 5;

/// Observable object: some state plus the sequence number describing it
struct Table {
    rows: RwLock<Vec<u64>>,
    seq: RwLock<Option<Seq>>,
    closed: AtomicBool,
}

fn observe(id: usize, table: Arc<Table>) -> PollResult<usize> {
    let mut last_seen = 0;
    let mut seen_changes = 0;

    loop {
        {
            let guard = table.seq.read();
            let Some(seq) = guard.as_ref() else {
                break;
            };
            let current = seq.read();
            if current != last_seen {
                let rows = table.rows.read().len();
                info!(observer = id, value = current, rows, "observed change");
                last_seen = current;
                seen_changes += 1;
            }
            seq.wait(current);
        }

        match poll::block(Some(Duration::from_secs(5))) {
            Ok(()) => {}
            Err(PollError::Timeout) => warn!(observer = id, "no change within 5s"),
            Err(e) => return Err(e),
        }

        if table.closed.load(Ordering::Acquire) {
            break;
        }
    }

    info!(observer = id, seen_changes, "observer finished");
    Ok(seen_changes)
}

fn main() -> miette::Result<()> {
    init_tracing();

    let table = Arc::new(Table {
        rows: RwLock::new(Vec::new()),
        seq: RwLock::new(Some(Seq::new())),
        closed: AtomicBool::new(false),
    });
    if let Some(seq) = table.seq.read().as_ref() {
        info!(seq = seq.id().as_u64(), value = seq.read(), "table created");
    }

    let observers: Vec<_> = (0..OBSERVERS)
        .map(|id| {
            let table = table.clone();
            thread::Builder::new()
                .name(format!("observer-{id}"))
                .spawn(move || observe(id, table))
        })
        .collect::<Result<_, _>>()
        .into_diagnostic()?;

    for row in 0..UPDATES {
        thread::sleep(Duration::from_millis(50));
        table.rows.write().push(row);
        if let Some(seq) = table.seq.read().as_ref() {
            seq.change();
        }
    }

    thread::sleep(Duration::from_millis(50));
    table.closed.store(true, Ordering::Release);
    if let Some(seq) = table.seq.write().take() {
        info!(value = seq.read(), waiters = seq.waiter_count(), "destroying seq");
        seq.destroy();
    }

    for handle in observers {
        // PollError renders with its diagnostic code and help text
        let seen = handle
            .join()
            .map_err(|_| miette!("observer thread panicked"))??;
        info!(seen, "observer joined");
    }

    Ok(())
}
