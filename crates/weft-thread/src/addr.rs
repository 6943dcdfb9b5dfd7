//! Thread IDs carried inside peer multiaddrs
//!
//! A thread address is a regular multiaddr followed by a `thread` component:
//!
//! ```text
//! /ip4/127.0.0.1/tcp/4006/thread/bafk...
//! ```
//!
//! The `thread` protocol is not part of the multiaddr registry, so the component
//! is split off and handled here; the peer part is parsed by `multiaddr`.
//! Parsing accepts the `thread` component at any position; components after
//! it belong to the peer part, and formatting always puts `thread` last.

use crate::{Result, ThreadError, ThreadId};
use multiaddr::{Multiaddr, Protocol};
use std::fmt;
use std::str::FromStr;

/// Reserved protocol name for thread components
pub const PROTOCOL_NAME: &str = "thread";

/// Reserved protocol code for thread components
pub const PROTOCOL_CODE: u32 = 406;

/// A thread ID attached to a (possibly empty) peer address
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThreadAddr {
    peer: Multiaddr,
    id: ThreadId,
}

impl ThreadAddr {
    /// Attach a thread ID to a peer address
    pub fn new(peer: Multiaddr, id: ThreadId) -> Self {
        Self { peer, id }
    }

    /// A bare `/thread/<id>` address
    pub fn from_id(id: ThreadId) -> Self {
        Self {
            peer: Multiaddr::empty(),
            id,
        }
    }

    /// Get the peer part
    pub fn peer(&self) -> &Multiaddr {
        &self.peer
    }

    /// Get the thread ID
    pub fn id(&self) -> &ThreadId {
        &self.id
    }

    /// Split into peer address and thread ID
    pub fn into_parts(self) -> (Multiaddr, ThreadId) {
        (self.peer, self.id)
    }

    /// Binary form: peer bytes, then `<406><len><id bytes>`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut code_buf = unsigned_varint::encode::u32_buffer();
        let mut len_buf = unsigned_varint::encode::usize_buffer();
        let id = self.id.as_bytes();

        let mut out = self.peer.to_vec();
        out.extend_from_slice(unsigned_varint::encode::u32(PROTOCOL_CODE, &mut code_buf));
        out.extend_from_slice(unsigned_varint::encode::usize(id.len(), &mut len_buf));
        out.extend_from_slice(id);
        out
    }

    /// Parse the binary form produced by [`ThreadAddr::to_bytes`]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut peer = Multiaddr::empty();
        let mut id = None;
        let mut rest = data;

        while !rest.is_empty() {
            let (code, after_code) = unsigned_varint::decode::u32(rest)?;
            if code != PROTOCOL_CODE {
                let (protocol, next) = Protocol::from_bytes(rest)?;
                peer = peer.with(protocol);
                rest = next;
                continue;
            }

            if id.is_some() {
                return Err(ThreadError::InvalidAddr(format!(
                    "more than one {} component",
                    PROTOCOL_NAME
                )));
            }
            let (len, after_len) = unsigned_varint::decode::usize(after_code)?;
            if after_len.len() < len {
                return Err(ThreadError::InvalidAddr(format!(
                    "{} component declares {} bytes, {} present",
                    PROTOCOL_NAME,
                    len,
                    after_len.len()
                )));
            }
            let (id_bytes, next) = after_len.split_at(len);
            id = Some(ThreadId::cast(id_bytes)?);
            rest = next;
        }

        let id = id.ok_or_else(|| {
            ThreadError::InvalidAddr(format!("no {} component", PROTOCOL_NAME))
        })?;
        Ok(Self { peer, id })
    }
}

impl fmt::Display for ThreadAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.peer, PROTOCOL_NAME, self.id)
    }
}

impl FromStr for ThreadAddr {
    type Err = ThreadError;

    fn from_str(s: &str) -> Result<Self> {
        let marker = format!("/{}/", PROTOCOL_NAME);
        let pos = s.find(&marker).ok_or_else(|| {
            ThreadError::InvalidAddr(format!("missing /{} component in {}", PROTOCOL_NAME, s))
        })?;

        let (head, rest) = s.split_at(pos);
        let rest = &rest[marker.len()..];
        // Base64 IDs may contain '/', so try the whole remainder first
        let (id, tail) = match ThreadId::decode(rest) {
            Ok(id) => (id, ""),
            Err(_) => {
                let (id, tail) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
                (ThreadId::decode(id)?, tail)
            }
        };

        let peer = format!("{head}{tail}");
        let peer = if peer.is_empty() {
            Multiaddr::empty()
        } else {
            peer.parse::<Multiaddr>()?
        };

        Ok(Self { peer, id })
    }
}

impl From<ThreadId> for ThreadAddr {
    fn from(id: ThreadId) -> Self {
        Self::from_id(id)
    }
}

/// Extract the thread ID from an address string
pub fn id_from_addr(s: &str) -> Result<ThreadId> {
    Ok(s.parse::<ThreadAddr>()?.id)
}
