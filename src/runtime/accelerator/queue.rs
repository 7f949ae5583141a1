//! In-order execution queue for accelerator operations

use crate::error::Result;
use crate::runtime::Event;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc::{Sender, channel};

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// In-order queue executing submitted operations on a worker thread
///
/// Operations run in submission order. Each submission returns an
/// [`Event`] that settles once the operation has run.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    name: String,
    /// `None` when no worker thread could be started; jobs then run inline
    sender: Mutex<Option<Sender<(Job, Event)>>>,
    /// Most recently submitted operation
    last: Mutex<Event>,
}

impl Queue {
    /// Create a queue and start its worker thread
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (tx, rx) = channel::<(Job, Event)>();

        let spawned = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                // Ends once every sender is gone
                for (job, event) in rx {
                    let outcome = job();
                    event.settle(outcome);
                }
            });

        let sender = match spawned {
            Ok(_) => Some(tx),
            Err(err) => {
                tracing::warn!(queue = %name, error = %err, "queue worker unavailable, running inline");
                None
            }
        };

        Self {
            inner: Arc::new(QueueInner {
                name,
                sender: Mutex::new(sender),
                last: Mutex::new(Event::completed()),
            }),
        }
    }

    /// Name of this queue
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Submit an operation, returning its completion handle
    pub fn submit<F>(&self, job: F) -> Event
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let event = Event::pending();
        let sender = self.inner.sender.lock();

        let job: Job = Box::new(job);
        let rejected = match sender.as_ref() {
            Some(tx) => tx.send((job, event.clone())).err().map(|e| (e.0).0),
            None => Some(job),
        };
        if let Some(job) = rejected {
            event.settle(job());
        }

        tracing::trace!(queue = %self.inner.name, event = event.id(), "submitted");
        *self.inner.last.lock() = event.clone();
        event
    }

    /// Block until every operation submitted so far has run
    ///
    /// Returns the outcome of the most recent submission; earlier failures
    /// are reported through their own events.
    pub fn wait(&self) -> Result<()> {
        let last = self.inner.last.lock().clone();
        last.wait()
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.inner.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_queue_runs_in_order() {
        let queue = Queue::new("test-queue");
        let log = Arc::new(Mutex::new(Vec::new()));

        let events: Vec<Event> = (0..16)
            .map(|i| {
                let log = Arc::clone(&log);
                queue.submit(move || {
                    log.lock().push(i);
                    Ok(())
                })
            })
            .collect();

        queue.wait().unwrap();
        assert!(events.iter().all(Event::is_complete));
        assert_eq!(*log.lock(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_queue_reports_failure_on_event() {
        let queue = Queue::new("test-queue-fail");
        let event = queue.submit(|| Err(Error::Internal("kernel fault".into())));
        assert!(event.wait().is_err());

        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let ok = queue.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        ok.wait().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
