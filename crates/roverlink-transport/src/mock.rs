use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory channel for tests.
///
/// Clones share the same buffers, so a test can keep one handle while the
/// engine owns another. Reads drain injected bytes and report EOF (`Ok(0)`)
/// once the buffer is empty.
#[derive(Clone, Default)]
pub struct MockChannel {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent reads.
    pub fn inject_read(&self, data: &[u8]) {
        self.lock().read_buffer.extend(data);
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().write_buffer.clone()
    }

    /// Take everything written so far, leaving the write buffer empty.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().write_buffer)
    }

    pub fn clear_written(&self) {
        self.lock().write_buffer.clear();
    }

    pub fn clear_read(&self) {
        self.lock().read_buffer.clear();
    }

    /// Bytes injected but not yet read.
    pub fn pending_read(&self) -> usize {
        self.lock().read_buffer.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Read for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inner = self.lock();
        let available = inner.read_buffer.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(inner.read_buffer.drain(..available)) {
            *slot = byte;
        }
        Ok(available)
    }
}

impl Write for MockChannel {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.lock().write_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MockChannel")
            .field("pending_read", &inner.read_buffer.len())
            .field("written", &inner.write_buffer.len())
            .finish()
    }
}
