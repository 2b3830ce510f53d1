//! Outgoing side of the serial transport.

use crate::context::Port;

/// Sends an encoded reply back over the port a command arrived on.
///
/// Framing, obfuscation and checksums are the transport's business; the
/// handlers hand over the raw reply struct bytes only.
pub trait ReplySink {
    /// Queue `reply` for transmission on `port`.
    fn send_reply(&mut self, port: Port, reply: &[u8]);
}

impl<S: ReplySink + ?Sized> ReplySink for &mut S {
    fn send_reply(&mut self, port: Port, reply: &[u8]) {
        (**self).send_reply(port, reply);
    }
}

/// A sink that records every reply.
#[derive(Debug, Clone, Default)]
pub struct ReplyLog {
    replies: Vec<(Port, Vec<u8>)>,
}

impl ReplyLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All replies sent so far, oldest first.
    pub fn replies(&self) -> &[(Port, Vec<u8>)] {
        &self.replies
    }

    /// Number of replies sent.
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    /// Whether nothing was sent.
    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    /// Remove and return the most recent reply.
    pub fn take_last(&mut self) -> Option<(Port, Vec<u8>)> {
        self.replies.pop()
    }

    /// Forget all recorded replies.
    pub fn clear(&mut self) {
        self.replies.clear();
    }
}

impl ReplySink for ReplyLog {
    fn send_reply(&mut self, port: Port, reply: &[u8]) {
        self.replies.push((port, reply.to_vec()));
    }
}
