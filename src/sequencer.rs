//! Request sequencing: newest token wins.
//!
//! Every fetch takes a token before it starts. When it completes, its result
//! is applied only if no newer token was issued on the same channel in the
//! meantime. In-flight requests are never aborted; superseded ones are
//! ignored when they land.

use crate::models::Channel;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordering token for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    channel: Channel,
    seq: u64,
}

impl RequestToken {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.channel, self.seq)
    }
}

/// One monotonically increasing counter per channel.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: [AtomicU64; Channel::ALL.len()],
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token; it becomes the channel's latest and supersedes
    /// every earlier one.
    pub fn issue(&self, channel: Channel) -> RequestToken {
        let seq = self.latest[channel.index()].fetch_add(1, Ordering::SeqCst) + 1;
        RequestToken { channel, seq }
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.latest[token.channel.index()].load(Ordering::SeqCst) == token.seq
    }

    /// Sequence number of the latest issued token, 0 if none yet.
    pub fn latest(&self, channel: Channel) -> u64 {
        self.latest[channel.index()].load(Ordering::SeqCst)
    }
}
