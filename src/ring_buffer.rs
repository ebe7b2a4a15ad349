use std::fmt;

use rtrb::RingBuffer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingFull {
    pub requested: usize,
    pub free: usize,
}

impl fmt::Display for RingFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ring buffer full: {} bytes requested, {} free",
            self.requested, self.free
        )
    }
}

impl std::error::Error for RingFull {}

pub fn ring_buffer(capacity: usize) -> (Producer, Consumer) {
    assert!(capacity > 0, "ring buffer capacity must be greater than zero");
    let (producer, consumer) = RingBuffer::<u8>::new(capacity);
    (Producer { inner: producer }, Consumer { inner: consumer })
}

pub struct Producer {
    inner: rtrb::Producer<u8>,
}

impl Producer {
    #[inline]
    pub fn free_bytes(&self) -> usize {
        self.inner.slots()
    }

    /// Appends all of `bytes` or nothing at all.
    pub fn try_write(&mut self, bytes: &[u8]) -> Result<(), RingFull> {
        let requested = bytes.len();
        let free = self.inner.slots();
        let mut chunk = self
            .inner
            .write_chunk(requested)
            .map_err(|_| RingFull { requested, free })?;
        let (head, tail) = chunk.as_mut_slices();
        let split = head.len();
        head.copy_from_slice(&bytes[..split]);
        tail.copy_from_slice(&bytes[split..]);
        chunk.commit_all();
        Ok(())
    }
}

pub struct Consumer {
    inner: rtrb::Consumer<u8>,
}

impl Consumer {
    #[inline]
    pub fn available_bytes(&self) -> usize {
        self.inner.slots()
    }

    /// Fills `out` from the front of the ring.
    ///
    /// Callers check [`Consumer::available_bytes`] first; asking for more
    /// than is available panics.
    pub fn read(&mut self, out: &mut [u8]) {
        let available = self.inner.slots();
        let chunk = match self.inner.read_chunk(out.len()) {
            Ok(chunk) => chunk,
            Err(_) => panic!(
                "ring buffer read of {} bytes with only {available} available",
                out.len()
            ),
        };
        let (head, tail) = chunk.as_slices();
        out[..head.len()].copy_from_slice(head);
        out[head.len()..].copy_from_slice(tail);
        chunk.commit_all();
    }
}
