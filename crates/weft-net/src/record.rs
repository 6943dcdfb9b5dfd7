//! Signed log records
//!
//! A record is a dag-cbor block linking to the previous record of the same
//! log. Its CID is a CIDv1 with the dag-cbor codec over the blake3 hash of
//! the block. The signature covers the thread ID, the previous CID and the
//! body, so a record cannot be replayed into another thread.

use crate::{NetError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use cid::Cid;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};
use weft_thread::{LogId, ThreadId};

/// Multicodec code for dag-cbor
pub const DAG_CBOR: u64 = 0x71;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct RecordBlock {
    log: Bytes,
    prev: Option<Bytes>,
    body: Bytes,
    sig: Bytes,
    created_at: DateTime<Utc>,
}

/// One entry of a log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    cid: Cid,
    block: RecordBlock,
}

impl Record {
    /// Sign a new record on top of `prev`
    pub fn sign(
        thread: &ThreadId,
        key: &SigningKey,
        prev: Option<Cid>,
        body: Bytes,
    ) -> Result<Self> {
        let prev = prev.map(|cid| Bytes::from(cid.to_bytes()));
        let sig = key.sign(&signing_payload(thread, prev.as_deref(), &body));
        let block = RecordBlock {
            log: Bytes::from(LogId::from_public_key(&key.verifying_key()).as_bytes().to_vec()),
            prev,
            body,
            sig: Bytes::copy_from_slice(&sig.to_bytes()),
            created_at: Utc::now(),
        };
        Self::from_parts(block)
    }

    /// Decode a stored block
    pub fn from_block(data: &[u8]) -> Result<Self> {
        let block: RecordBlock = weft_store::decode_cbor(data)
            .map_err(|e| NetError::InvalidRecord(e.to_string()))?;
        Self::from_parts(block)
    }

    fn from_parts(block: RecordBlock) -> Result<Self> {
        let encoded = weft_store::encode_cbor(&block)?;
        Ok(Self {
            cid: Cid::new_v1(DAG_CBOR, Code::Blake3_256.digest(&encoded)),
            block,
        })
    }

    /// Encode as a dag-cbor block
    pub fn to_block(&self) -> Result<Bytes> {
        Ok(weft_store::encode_cbor(&self.block)?)
    }

    /// Check the signature against the author's key
    pub fn verify(&self, thread: &ThreadId, key: &VerifyingKey) -> Result<()> {
        if self.block.log.as_ref() != LogId::from_public_key(key).as_bytes() {
            return Err(NetError::InvalidRecord(format!(
                "record {} was not written by this log",
                self.cid
            )));
        }
        let sig = Signature::from_slice(&self.block.sig)
            .map_err(|e| NetError::InvalidRecord(e.to_string()))?;
        key.verify(
            &signing_payload(thread, self.block.prev.as_deref(), &self.block.body),
            &sig,
        )
        .map_err(|_| NetError::InvalidRecord(format!("bad signature on {}", self.cid)))
    }

    /// Get the content identifier
    pub fn cid(&self) -> Cid {
        self.cid
    }

    /// Get the authoring log
    pub fn log_id(&self) -> Result<LogId> {
        Ok(LogId::from_bytes(&self.block.log)?)
    }

    /// Get the previous record, if any
    pub fn prev(&self) -> Result<Option<Cid>> {
        self.block
            .prev
            .as_deref()
            .map(|bytes| {
                Cid::try_from(bytes).map_err(|e| NetError::InvalidRecord(e.to_string()))
            })
            .transpose()
    }

    /// Get the payload
    pub fn body(&self) -> &Bytes {
        &self.block.body
    }

    /// Get the creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.block.created_at
    }
}

fn signing_payload(thread: &ThreadId, prev: Option<&[u8]>, body: &[u8]) -> Vec<u8> {
    let prev = prev.unwrap_or_default();
    let mut msg = Vec::with_capacity(thread.as_bytes().len() + prev.len() + body.len() + 2);
    msg.extend_from_slice(thread.as_bytes());
    msg.push(0);
    msg.extend_from_slice(prev);
    msg.push(0);
    msg.extend_from_slice(body);
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_thread::generate_log_key;

    #[test]
    fn test_sign_and_verify() {
        let thread = ThreadId::new_random();
        let key = generate_log_key();

        let first = Record::sign(&thread, &key, None, Bytes::from("one")).unwrap();
        let second = Record::sign(&thread, &key, Some(first.cid()), Bytes::from("two")).unwrap();

        first.verify(&thread, &key.verifying_key()).unwrap();
        second.verify(&thread, &key.verifying_key()).unwrap();
        assert_eq!(second.prev().unwrap(), Some(first.cid()));
        assert_eq!(first.prev().unwrap(), None);
        assert_eq!(first.log_id().unwrap(), LogId::from_public_key(&key.verifying_key()));
    }

    #[test]
    fn test_block_roundtrip_keeps_cid() {
        let thread = ThreadId::new_random();
        let record = Record::sign(&thread, &generate_log_key(), None, Bytes::from("x")).unwrap();

        let decoded = Record::from_block(&record.to_block().unwrap()).unwrap();
        assert_eq!(decoded.cid(), record.cid());
        assert_eq!(decoded.cid().codec(), DAG_CBOR);
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_verify_rejects_other_thread_and_key() {
        let thread = ThreadId::new_random();
        let key = generate_log_key();
        let record = Record::sign(&thread, &key, None, Bytes::from("x")).unwrap();

        assert!(matches!(
            record.verify(&ThreadId::new_random(), &key.verifying_key()),
            Err(NetError::InvalidRecord(_))
        ));
        assert!(matches!(
            record.verify(&thread, &generate_log_key().verifying_key()),
            Err(NetError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_garbage_block() {
        assert!(matches!(
            Record::from_block(b"not cbor"),
            Err(NetError::InvalidRecord(_))
        ));
    }
}
