//! Hand-off of accepted messages from sessions to the processing workers

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::mta::error::QueueError;
use crate::mta::handler::Handler;
use crate::smtp::envelope::Envelope;

/// Producer side of the mail queue.
///
/// Cheap to clone, one clone per connection. [`MailQueue::submit`] blocks
/// while the workers are busy and the buffer (if any) is full, so a slow
/// handler chain throttles sessions instead of piling up messages.
#[derive(Debug, Clone)]
pub struct MailQueue {
    sender: SyncSender<Envelope>,
}

/// The worker threads draining a [`MailQueue`]
#[derive(Debug)]
pub struct QueueWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl MailQueue {
    /// Start `workers` threads (at least one) running `handler` on every
    /// submitted envelope.
    ///
    /// `capacity` is the number of envelopes that may wait; zero makes each
    /// submission a rendezvous with a worker. Envelopes are taken in
    /// submission order; with several workers they may finish out of order.
    pub fn start<H>(
        handler: H,
        workers: usize,
        capacity: usize,
    ) -> Result<(MailQueue, QueueWorkers), QueueError>
    where
        H: Handler + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let handler: Arc<dyn Handler> = Arc::new(handler);

        let mut handles = Vec::new();
        for id in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let handler = Arc::clone(&handler);
            let handle = thread::Builder::new()
                .name(format!("mail-queue-{id}"))
                .spawn(move || run_worker(id, &receiver, handler.as_ref()))?;
            handles.push(handle);
        }

        Ok((MailQueue { sender }, QueueWorkers { handles }))
    }

    /// Hand an envelope to the workers, waiting until one can take it.
    ///
    /// Fails only when every worker has stopped.
    pub fn submit(&self, envelope: Envelope) -> Result<(), QueueError> {
        self.sender.send(envelope).map_err(|_| QueueError::Closed)
    }
}

impl QueueWorkers {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for the workers to finish.
    ///
    /// Workers stop once every [`MailQueue`] handle is dropped and the
    /// envelopes already submitted are processed.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("mail queue worker panicked");
            }
        }
    }
}

fn run_worker(id: usize, receiver: &Mutex<Receiver<Envelope>>, handler: &dyn Handler) {
    loop {
        // The lock is held only while waiting, so one worker at a time takes
        // the next envelope and the others queue up behind it.
        let next = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(poisoned) => poisoned.into_inner().recv(),
        };

        let mut envelope = match next {
            Ok(envelope) => envelope,
            Err(_) => break,
        };

        debug!(
            worker = id,
            session_id = %envelope.session_id,
            ip = %envelope.ip,
            "processing envelope"
        );
        handler.handle(&mut envelope);
    }

    debug!(worker = id, "mail queue closed, worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_single_worker_preserves_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let seen = Arc::clone(&seen);
            move |envelope: &mut Envelope| seen.lock().unwrap().push(envelope.data.clone())
        };

        let (queue, workers) = MailQueue::start(handler, 1, 0).unwrap();
        for i in 0..10u8 {
            let mut envelope = Envelope::default();
            envelope.data = vec![i];
            queue.submit(envelope).unwrap();
        }
        drop(queue);
        workers.join();

        let expected: Vec<Vec<u8>> = (0..10u8).map(|i| vec![i]).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn test_concurrent_producers_deliver_exactly_once() {
        const PRODUCERS: usize = 16;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handler = {
            let seen = Arc::clone(&seen);
            let active = Arc::clone(&active);
            let overlap = Arc::clone(&overlap);
            move |envelope: &mut Envelope| {
                if active.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(2));
                seen.lock().unwrap().push(envelope.session_id);
                active.fetch_sub(1, Ordering::SeqCst);
            }
        };

        let (queue, workers) = MailQueue::start(handler, 1, 0).unwrap();

        let mut ids = HashSet::new();
        let mut producers = Vec::new();
        for _ in 0..PRODUCERS {
            let id = Uuid::new_v4();
            ids.insert(id);
            let queue = queue.clone();
            producers.push(thread::spawn(move || {
                let mut envelope = Envelope::default();
                envelope.session_id = id;
                queue.submit(envelope).unwrap();
            }));
        }
        for producer in producers {
            producer.join().unwrap();
        }
        drop(queue);
        workers.join();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), PRODUCERS);
        assert_eq!(seen.iter().copied().collect::<HashSet<_>>(), ids);
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_submit_waits_for_a_free_worker() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let handler = move |_: &mut Envelope| {
            started_tx.send(()).unwrap();
            release_rx.lock().unwrap().recv().unwrap();
        };

        let (queue, workers) = MailQueue::start(handler, 1, 0).unwrap();
        queue.submit(Envelope::default()).unwrap();
        // the only worker is now inside the handler
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let submitted = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = queue.clone();
            let submitted = Arc::clone(&submitted);
            thread::spawn(move || {
                queue.submit(Envelope::default()).unwrap();
                submitted.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(300));
        assert!(!submitted.load(Ordering::SeqCst));

        release_tx.send(()).unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();
        assert!(submitted.load(Ordering::SeqCst));

        release_tx.send(()).unwrap();
        drop(queue);
        workers.join();
    }

    #[test]
    fn test_multiple_workers_share_the_queue() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = {
            let count = Arc::clone(&count);
            move |_: &mut Envelope| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };

        let (queue, workers) = MailQueue::start(handler, 4, 2).unwrap();
        assert_eq!(workers.len(), 4);
        for _ in 0..50 {
            queue.submit(Envelope::default()).unwrap();
        }
        drop(queue);
        workers.join();

        assert_eq!(count.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_zero_workers_still_starts_one() {
        let (_queue, workers) = MailQueue::start(|_: &mut Envelope| {}, 0, 0).unwrap();
        assert_eq!(workers.len(), 1);
    }

    #[test]
    fn test_submit_after_workers_stop() {
        fn failing(_: &mut Envelope) {
            panic!("handler failure");
        }
        let (queue, workers) = MailQueue::start(failing, 1, 0).unwrap();

        // The first envelope kills the only worker.
        let _ = queue.submit(Envelope::default());
        workers.join();

        assert!(matches!(
            queue.submit(Envelope::default()),
            Err(QueueError::Closed)
        ));
    }
}
