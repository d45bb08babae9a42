//! In-process emulation of an extended-addressing target.
//!
//! The target owns a flat 1 MiB memory (the full 20-bit address space).
//! Read frames are answered with the request header followed by memory
//! contents; write frames are stored and echoed back.
//!
//! A host that waits for each reply before sending its next frame never
//! makes the target see two outstanding requests. The target counts every
//! time it does, which lets tests check that round trips are serialized.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::link::Link;
use crate::protocol::{Frame, FrameBuffer, ADDRESS_MASK};

const MEMORY_SIZE: usize = ADDRESS_MASK as usize + 1;
const PIPE_CAPACITY: usize = 4096;

struct Shared {
    memory: Mutex<Vec<u8>>,
    reply_delay: Mutex<Duration>,
    silent: AtomicBool,
    frames_served: AtomicUsize,
    overlapped: AtomicUsize,
}

/// Emulated target reachable through [`Connector::Loopback`](super::Connector::Loopback).
///
/// Clones share the same memory and counters.
#[derive(Clone)]
pub struct LoopbackTarget {
    shared: Arc<Shared>,
}

impl LoopbackTarget {
    /// Create a target with zeroed memory.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                memory: Mutex::new(vec![0; MEMORY_SIZE]),
                reply_delay: Mutex::new(Duration::ZERO),
                silent: AtomicBool::new(false),
                frames_served: AtomicUsize::new(0),
                overlapped: AtomicUsize::new(0),
            }),
        }
    }

    /// Delay every reply by `delay`.
    pub fn with_reply_delay(self, delay: Duration) -> Self {
        *lock(&self.shared.reply_delay) = delay;
        self
    }

    /// Stop (or resume) answering frames.
    pub fn set_silent(&self, silent: bool) {
        self.shared.silent.store(silent, Ordering::SeqCst);
    }

    /// Copy bytes out of target memory.
    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        let memory = lock(&self.shared.memory);
        (0..len)
            .map(|i| memory[wrap(address as usize + i)])
            .collect()
    }

    /// Store bytes directly in target memory.
    pub fn poke(&self, address: u32, data: &[u8]) {
        let mut memory = lock(&self.shared.memory);
        for (i, byte) in data.iter().enumerate() {
            memory[wrap(address as usize + i)] = *byte;
        }
    }

    /// Number of frames answered so far.
    pub fn frames_served(&self) -> usize {
        self.shared.frames_served.load(Ordering::SeqCst)
    }

    /// Number of frames that arrived while another was still unanswered.
    pub fn overlapped_requests(&self) -> usize {
        self.shared.overlapped.load(Ordering::SeqCst)
    }

    /// Open a new link to this target.
    pub(crate) fn attach(&self) -> Link {
        let (host, device) = duplex(PIPE_CAPACITY);
        tokio::spawn(self.clone().serve(device));
        Link::new(host, "loopback")
    }

    async fn serve<S>(self, mut stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut frames = FrameBuffer::new();
        let mut pending = VecDeque::new();
        let mut buf = [0u8; 1024];

        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            if !self.ingest(&mut frames, &mut pending, &buf[..n]) {
                continue;
            }

            while let Some(frame) = pending.pop_front() {
                let delay = *lock(&self.shared.reply_delay);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                    // Anything that arrived during the delay was sent early
                    while let Ok(Ok(n)) =
                        tokio::time::timeout(Duration::ZERO, stream.read(&mut buf)).await
                    {
                        if n == 0 {
                            break;
                        }
                        self.ingest(&mut frames, &mut pending, &buf[..n]);
                    }
                }
                if !pending.is_empty() || !frames.is_empty() {
                    self.shared.overlapped.fetch_add(1, Ordering::SeqCst);
                }

                if self.shared.silent.load(Ordering::SeqCst) {
                    continue;
                }
                let reply = self.answer(&frame);
                self.shared.frames_served.fetch_add(1, Ordering::SeqCst);
                if stream.write_all(&reply).await.is_err() || stream.flush().await.is_err() {
                    return;
                }
            }
        }
        tracing::debug!("Loopback target detached");
    }

    fn ingest(&self, frames: &mut FrameBuffer, pending: &mut VecDeque<Frame>, data: &[u8]) -> bool {
        match frames.push(data) {
            Ok(parsed) => {
                pending.extend(parsed);
                true
            }
            Err(e) => {
                tracing::warn!("Loopback target dropped malformed input: {}", e);
                frames.clear();
                false
            }
        }
    }

    fn answer(&self, frame: &Frame) -> BytesMut {
        let mut reply = BytesMut::with_capacity(frame.len());
        if frame.opcode().is_write() {
            self.poke(frame.address(), frame.data());
            reply.put_slice(&frame.to_bytes());
        } else {
            reply.put_slice(&frame.header.encode());
            reply.put_slice(&self.peek(frame.address(), frame.payload.len()));
        }
        reply
    }
}

impl Default for LoopbackTarget {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap(address: usize) -> usize {
    address & (MEMORY_SIZE - 1)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
