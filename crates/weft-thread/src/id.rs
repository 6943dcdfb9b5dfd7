//! Self-describing thread identifiers
//!
//! A thread ID names a thread (and the database bound to it). Its byte form is
//!
//! ```text
//! <version:uvarint><variant:uvarint><payload>
//! ```
//!
//! and its text form is a multibase string:
//!
//! ```text
//! <multibase-tag><base-encoded-bytes>
//! ```
//!
//! Validation happens once, in the constructors. Every `ThreadId` value is
//! therefore well-formed and its accessors cannot fail.

use crate::{addr::ThreadAddr, Result, ThreadError};
use bytes::{BufMut, Bytes, BytesMut};
use ed25519_dalek::VerifyingKey;
use multibase::Base;
use multihash_codetable::{Code, MultihashDigest};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Payload size of random-variant IDs
pub const RANDOM_VARIANT_SIZE: usize = 38;

/// Base used by the default text form (`b` tag)
pub const DEFAULT_BASE: Base = Base::Base32Lower;

/// Prefix of the decentralized identifier form
pub const DID_PREFIX: &str = "did:thread:";

/// Thread ID version
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Version {
    /// The current (and only) version
    V1,
}

impl Version {
    /// Get the varint code
    pub const fn code(self) -> u64 {
        match self {
            Version::V1 => 0x01,
        }
    }

    /// Parse from varint code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x01 => Some(Version::V1),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// How the payload of a thread ID was produced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Payload is random bytes (0x55)
    Random,
    /// Payload is a multihash of a public key (0x70)
    PubKey,
}

impl Variant {
    /// Get the varint code
    pub const fn code(self) -> u64 {
        match self {
            Variant::Random => 0x55,
            Variant::PubKey => 0x70,
        }
    }

    /// Parse from varint code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x55 => Some(Variant::Random),
            0x70 => Some(Variant::PubKey),
            _ => None,
        }
    }

    /// Get a human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Variant::Random => "random",
            Variant::PubKey => "pubkey",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated, immutable thread identifier.
///
/// Equality, hashing and ordering compare the raw bytes.
#[derive(Clone)]
pub struct ThreadId {
    bytes: Bytes,
    version: Version,
    variant: Variant,
    payload_offset: usize,
}

impl ThreadId {
    /// Generate a new random V1 ID from the operating system RNG.
    ///
    /// The OS RNG aborts the process if no entropy is available; there is no
    /// safe way to continue without it.
    pub fn new_random() -> Self {
        let mut payload = [0u8; RANDOM_VARIANT_SIZE];
        OsRng.fill_bytes(&mut payload);
        Self::assemble(Variant::Random, &payload)
    }

    /// Generate a new random V1 ID from the given RNG
    pub fn random_from<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut payload = [0u8; RANDOM_VARIANT_SIZE];
        rng.try_fill_bytes(&mut payload)
            .map_err(|e| ThreadError::Randomness(e.to_string()))?;
        Ok(Self::assemble(Variant::Random, &payload))
    }

    /// Derive a V1 ID from an ed25519 public key.
    ///
    /// The payload is the sha2-256 multihash of the key bytes.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let digest = Code::Sha2_256.digest(key.as_bytes());
        Self::assemble(Variant::PubKey, &digest.to_bytes())
    }

    fn assemble(variant: Variant, payload: &[u8]) -> Self {
        let mut version_buf = unsigned_varint::encode::u64_buffer();
        let mut variant_buf = unsigned_varint::encode::u64_buffer();
        let version_bytes = unsigned_varint::encode::u64(Version::V1.code(), &mut version_buf);
        let variant_bytes = unsigned_varint::encode::u64(variant.code(), &mut variant_buf);

        let mut buf = BytesMut::with_capacity(version_bytes.len() + variant_bytes.len() + payload.len());
        buf.put_slice(version_bytes);
        buf.put_slice(variant_bytes);
        let payload_offset = buf.len();
        buf.put_slice(payload);

        Self {
            bytes: buf.freeze(),
            version: Version::V1,
            variant,
            payload_offset,
        }
    }

    /// Parse a multibase-encoded ID string
    pub fn decode(s: &str) -> Result<Self> {
        if s.len() < 2 {
            return Err(ThreadError::TooShort);
        }
        let (_, data) = multibase::decode(s)?;
        Self::from_bytes(Bytes::from(data))
    }

    /// Validate and wrap the raw byte form (the output of [`ThreadId::as_bytes`]).
    ///
    /// Use [`ThreadId::decode`] for text.
    pub fn cast(data: &[u8]) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(data))
    }

    fn from_bytes(bytes: Bytes) -> Result<Self> {
        let parsed = parse(&bytes)?;
        Ok(Self {
            bytes,
            version: parsed.version,
            variant: parsed.variant,
            payload_offset: parsed.payload_offset,
        })
    }

    /// Get the multibase encoding used by an ID string.
    ///
    /// Succeeds for every string [`ThreadId::decode`] accepts.
    pub fn extract_encoding(s: &str) -> Result<Base> {
        if s.len() < 2 {
            return Err(ThreadError::TooShort);
        }
        let code = s.chars().next().ok_or(ThreadError::TooShort)?;
        Ok(Base::from_code(code)?)
    }

    /// Re-run the structural checks on this ID's bytes
    pub fn validate(&self) -> Result<()> {
        validate(&self.bytes)
    }

    /// Get the version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the variant
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Get the payload (random bytes or key multihash)
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.payload_offset..]
    }

    /// Get the raw byte form
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy out the raw byte form
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Encode in the given multibase
    pub fn encode(&self, base: Base) -> String {
        multibase::encode(base, &self.bytes)
    }

    /// Decentralized identifier form: `did:thread:<id>`
    pub fn did(&self) -> String {
        format!("{}{}", DID_PREFIX, self)
    }

    /// Wrap as a bare `/thread/<id>` address
    pub fn to_addr(&self) -> ThreadAddr {
        ThreadAddr::from_id(self.clone())
    }
}

struct Parsed {
    version: Version,
    variant: Variant,
    payload_offset: usize,
}

fn parse(data: &[u8]) -> Result<Parsed> {
    let (version, rest) = unsigned_varint::decode::u64(data)?;
    let version = Version::from_code(version).ok_or(ThreadError::UnsupportedVersion(version))?;

    let (variant, rest) = unsigned_varint::decode::u64(rest)?;
    let variant = Variant::from_code(variant).ok_or(ThreadError::UnsupportedVariant(variant))?;

    if rest.is_empty() {
        return Err(ThreadError::NoPayload);
    }

    Ok(Parsed {
        version,
        variant,
        payload_offset: data.len() - rest.len(),
    })
}

/// Check raw ID bytes: version, then variant, then a non-empty payload
pub fn validate(data: &[u8]) -> Result<()> {
    parse(data).map(|_| ())
}

impl PartialEq for ThreadId {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for ThreadId {}

impl Hash for ThreadId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl PartialOrd for ThreadId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ThreadId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(DEFAULT_BASE))
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({})", self)
    }
}

impl FromStr for ThreadId {
    type Err = ThreadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl TryFrom<&[u8]> for ThreadId {
    type Error = ThreadError;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::cast(data)
    }
}

impl TryFrom<Vec<u8>> for ThreadId {
    type Error = ThreadError;

    fn try_from(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes(Bytes::from(data))
    }
}

impl AsRef<[u8]> for ThreadId {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Serialize for ThreadId {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ThreadId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        ThreadId::decode(&s).map_err(serde::de::Error::custom)
    }
}
