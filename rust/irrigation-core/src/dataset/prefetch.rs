// rust/irrigation-core/src/dataset/prefetch.rs

//! Prefetching iterator that assembles minibatches ahead of the consumer.
//!
//! The wrapped [`WindowedIterator`] is moved into a background thread which
//! alone drives it. Finished minibatches are pushed into a bounded queue; the
//! consumer pops from the queue and waits while the producer is still busy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::queue::ArrayQueue;

use super::iterator::WindowedIterator;
use super::tensor::Minibatch;
use crate::config::PrefetchSettings;
use crate::error::Result;

/// Result type for prefetched items.
type PrefetchItem = Result<Minibatch>;

const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// A prefetching wrapper around [`WindowedIterator`].
pub struct PrefetchingIterator {
    /// Queue for receiving prefetched batches.
    queue: Arc<ArrayQueue<PrefetchItem>>,
    /// Flag to signal the prefetch thread to stop.
    stop_flag: Arc<AtomicBool>,
    /// Producer thread; hands the iterator back when it exits.
    prefetch_thread: Option<JoinHandle<WindowedIterator>>,
    /// Direct iteration when prefetching is disabled.
    fallback_iter: Option<WindowedIterator>,
    enabled: bool,
    exhausted: bool,
}

impl PrefetchingIterator {
    /// Starts prefetching from `iter`.
    ///
    /// With prefetching disabled, or a zero buffer, batches are produced on
    /// the caller's thread instead.
    pub fn new(iter: WindowedIterator, settings: &PrefetchSettings) -> Self {
        if !settings.enabled || settings.buffer_size == 0 {
            return Self {
                queue: Arc::new(ArrayQueue::new(1)),
                stop_flag: Arc::new(AtomicBool::new(false)),
                prefetch_thread: None,
                fallback_iter: Some(iter),
                enabled: false,
                exhausted: false,
            };
        }

        let queue = Arc::new(ArrayQueue::new(settings.buffer_size));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let queue_clone = queue.clone();
        let stop_flag_clone = stop_flag.clone();

        let prefetch_thread = thread::spawn(move || {
            let mut iter = iter;

            loop {
                if stop_flag_clone.load(Ordering::Relaxed) {
                    break;
                }

                match iter.next_batch() {
                    Ok(Some(batch)) => {
                        let mut item = Ok(batch);
                        // Wait for space in the queue.
                        loop {
                            if stop_flag_clone.load(Ordering::Relaxed) {
                                return iter;
                            }
                            match queue_clone.push(item) {
                                Ok(()) => break,
                                Err(rejected) => {
                                    item = rejected;
                                    thread::sleep(POLL_INTERVAL);
                                }
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "prefetch stopped on error");
                        let mut item = Err(e);
                        while let Err(rejected) = queue_clone.push(item) {
                            if stop_flag_clone.load(Ordering::Relaxed) {
                                return iter;
                            }
                            item = rejected;
                            thread::sleep(POLL_INTERVAL);
                        }
                        break;
                    }
                }
            }

            iter
        });

        tracing::debug!(buffer_size = settings.buffer_size, "prefetch thread started");

        Self {
            queue,
            stop_flag,
            prefetch_thread: Some(prefetch_thread),
            fallback_iter: None,
            enabled: true,
            exhausted: false,
        }
    }

    /// Gets the next minibatch, waiting for the producer if needed.
    ///
    /// There is no timeout: the call returns once an item is queued or the
    /// producer has finished.
    pub fn next_batch(&mut self) -> Result<Option<Minibatch>> {
        if self.exhausted {
            return Ok(None);
        }

        if !self.enabled {
            if let Some(ref mut iter) = self.fallback_iter {
                let result = iter.next_batch();
                if !matches!(result, Ok(Some(_))) {
                    self.exhausted = true;
                }
                return result;
            }
            return Ok(None);
        }

        loop {
            if let Some(item) = self.queue.pop() {
                if item.is_err() {
                    self.exhausted = true;
                }
                return item.map(Some);
            }

            let finished = self
                .prefetch_thread
                .as_ref()
                .map_or(true, |thread| thread.is_finished());
            if finished {
                // The producer may have pushed its last item just before exiting.
                if let Some(item) = self.queue.pop() {
                    if item.is_err() {
                        self.exhausted = true;
                    }
                    return item.map(Some);
                }
                self.exhausted = true;
                return Ok(None);
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Stops the prefetch thread and returns the wrapped iterator.
    ///
    /// If the consumer stopped early, the returned iterator's cursor is past
    /// the batches that were prefetched but never consumed.
    pub fn into_inner(mut self) -> Option<WindowedIterator> {
        if let Some(iter) = self.fallback_iter.take() {
            return Some(iter);
        }
        self.join()
    }

    /// Stops the prefetch thread and cleans up resources.
    pub fn stop(&mut self) {
        let _ = self.join();
    }

    fn join(&mut self) -> Option<WindowedIterator> {
        self.stop_flag.store(true, Ordering::Relaxed);
        let thread = self.prefetch_thread.take()?;
        match thread.join() {
            Ok(iter) => Some(iter),
            Err(_) => {
                tracing::error!("prefetch thread panicked");
                None
            }
        }
    }

    /// Returns true if prefetching is enabled.
    pub fn is_prefetching_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the number of items currently in the prefetch queue.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

impl Iterator for PrefetchingIterator {
    type Item = Result<Minibatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for PrefetchingIterator {
    fn drop(&mut self) {
        self.stop();
    }
}
