use std::fmt::Write as _;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

/// Switchable destination for the hex mirror of link traffic.
///
/// Clones share both the sink and the on/off switch, so one handle can be
/// given to the reader half and another to the writer half of a link.
pub struct DebugSink<S> {
    sink: Arc<Mutex<S>>,
    enabled: Arc<AtomicBool>,
}

impl<S> Clone for DebugSink<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            enabled: Arc::clone(&self.enabled),
        }
    }
}

impl<S: Write> DebugSink<S> {
    /// New sink, disabled until [`DebugSink::enable`] is called.
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Mirror `bytes` as space-separated uppercase hex (`"8D 0A D8 "`).
    ///
    /// Failures on the sink are logged and otherwise ignored; the link
    /// itself never fails because of the mirror.
    pub fn mirror(&self, bytes: &[u8]) {
        if bytes.is_empty() || !self.is_enabled() {
            return;
        }

        let mut line = String::with_capacity(bytes.len() * 3);
        for byte in bytes {
            let _ = write!(line, "{byte:02X} ");
        }

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = sink.write_all(line.as_bytes()).and_then(|()| sink.flush()) {
            warn!(error = %err, "debug sink write failed");
        }
    }

    /// Run `f` with the underlying sink.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut sink)
    }
}

/// Wraps a channel and mirrors every byte read or written to a [`DebugSink`].
pub struct Tee<T, S> {
    inner: T,
    debug: DebugSink<S>,
}

impl<T, S: Write> Tee<T, S> {
    pub fn new(inner: T, debug: DebugSink<S>) -> Self {
        Self { inner, debug }
    }

    pub fn debug_sink(&self) -> &DebugSink<S> {
        &self.debug
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read, S: Write> Read for Tee<T, S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.debug.mirror(&buf[..n]);
        Ok(n)
    }
}

impl<T: Write, S: Write> Write for Tee<T, S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.debug.mirror(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<T: std::fmt::Debug, S> std::fmt::Debug for Tee<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tee")
            .field("inner", &self.inner)
            .field("enabled", &self.debug.enabled.load(Ordering::Relaxed))
            .finish()
    }
}
