//! Bounded producer/worker pipeline shared by multipart upload and bulk import.

use std::{
    any::Any,
    io::{BufRead, BufReader, Read},
    panic::{self, AssertUnwindSafe},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
};

use bytes::Bytes;

use crate::error::{Error, Result};

/// Feeds `items` to `workers` threads through a queue holding at most
/// `workers` pending items and collects the handler results.
///
/// The calling thread is the producer. After the first failure, from the
/// producer or any handler, the producer stops, queued items are drained
/// without being handled, and in-flight handlers run to completion. The
/// queue is closed by dropping the sender and every worker is joined
/// before returning. A panicking handler counts as a failure and its worker
/// keeps draining the queue. Result order is unspecified.
pub(crate) fn run_bounded<T, R, I, F>(workers: usize, items: I, handler: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    I: IntoIterator<Item = Result<T>>,
    F: Fn(T) -> Result<R> + Sync,
{
    if workers == 0 {
        return Err(Error::parameter_invalid("workers must be at least 1"));
    }

    let (tx, rx) = mpsc::sync_channel::<T>(workers);
    let rx = Mutex::new(rx);
    let failed = AtomicBool::new(false);
    let first_error: Mutex<Option<Error>> = Mutex::new(None);

    let record = |err: Error| {
        let mut slot = lock(&first_error);
        if slot.is_none() {
            *slot = Some(err);
        }
        failed.store(true, Ordering::SeqCst);
    };

    let results = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let (rx, failed, handler, record) = (&rx, &failed, &handler, &record);
                scope.spawn(move || {
                    let mut out = Vec::new();
                    loop {
                        let item = lock(rx).recv();
                        let Ok(item) = item else {
                            break;
                        };
                        if failed.load(Ordering::SeqCst) {
                            continue;
                        }
                        match panic::catch_unwind(AssertUnwindSafe(|| handler(item))) {
                            Ok(Ok(value)) => out.push(value),
                            Ok(Err(err)) => record(err),
                            Err(payload) => record(Error::transport(
                                format!("worker panicked: {}", panic_message(&*payload)),
                                None,
                            )),
                        }
                    }
                    out
                })
            })
            .collect();

        for item in items {
            if failed.load(Ordering::SeqCst) {
                break;
            }
            match item {
                Ok(item) => {
                    if tx.send(item).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    record(err);
                    break;
                }
            }
        }
        drop(tx);

        let mut results = Vec::new();
        for handle in handles {
            match handle.join() {
                Ok(out) => results.extend(out),
                Err(_) => record(Error::transport("worker thread panicked", None)),
            }
        }
        results
    });

    let first_error = first_error
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match first_error {
        Some(err) => Err(err),
        None => Ok(results),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Splits a reader into numbered chunks of about `chunk_size` bytes.
///
/// With `line_aligned`, a full chunk is extended to the end of the current
/// line so records are never split across chunks.
pub(crate) struct Chunks<R> {
    reader: BufReader<R>,
    chunk_size: usize,
    next_index: Option<u64>,
    line_aligned: bool,
    emit_empty: bool,
    emitted: bool,
    done: bool,
}

impl<R: Read> Chunks<R> {
    pub(crate) fn new(reader: R, chunk_size: usize, first_index: u64) -> Self {
        Self {
            reader: BufReader::new(reader),
            chunk_size,
            next_index: Some(first_index),
            line_aligned: false,
            emit_empty: false,
            emitted: false,
            done: false,
        }
    }

    pub(crate) fn line_aligned(mut self) -> Self {
        self.line_aligned = true;
        self
    }

    /// Yield one empty chunk when the source has no data at all.
    pub(crate) fn emit_empty(mut self) -> Self {
        self.emit_empty = true;
        self
    }

    fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.chunk_size.min(8 * 1024 * 1024));
        (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut buf)?;

        if self.line_aligned && buf.len() == self.chunk_size && buf.last() != Some(&b'\n') {
            self.reader.read_until(b'\n', &mut buf)?;
        }
        Ok(buf)
    }
}

impl<R: Read> Iterator for Chunks<R> {
    type Item = Result<(u64, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let buf = match self.read_chunk() {
            Ok(buf) => buf,
            Err(err) => {
                self.done = true;
                return Some(Err(Error::transport(
                    "failed to read upload source",
                    Some(Box::new(err)),
                )));
            }
        };

        if buf.is_empty() {
            self.done = true;
            if self.emit_empty && !self.emitted {
                self.emitted = true;
                return self.next_index.map(|index| Ok((index, Bytes::new())));
            }
            return None;
        }

        if buf.len() < self.chunk_size {
            self.done = true;
        }

        let Some(index) = self.next_index else {
            self.done = true;
            return Some(Err(Error::parameter_invalid("chunk numbers exhausted")));
        };
        self.next_index = index.checked_add(1);
        self.emitted = true;
        Some(Ok((index, Bytes::from(buf))))
    }
}
