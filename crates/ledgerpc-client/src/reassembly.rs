//! Reassembly of chunked topic messages.
//!
//! A message too large for one transaction is submitted as several chunks
//! sharing the initial transaction id. Chunks may arrive in any order, be
//! duplicated, or never all arrive; an assembly that is still incomplete
//! [`CHUNK_EXPIRY`] after its first chunk is abandoned and later chunks for
//! it are dropped.
//!
//! Finished assemblies keep only a marker, never their chunks, so a replayed
//! or late chunk of a finished message is dropped however late it arrives.

use std::collections::HashMap;
use std::time::Duration;

use ledgerpc_common::messages::ConsensusTopicResponse;
use ledgerpc_common::{LedgerError, Result, TransactionId};
use tokio::time::Instant;
use tracing::debug;

use crate::topic::{MessageChunk, MessageHeader, TopicMessage};

/// How long an incomplete message waits for its remaining chunks.
pub const CHUNK_EXPIRY: Duration = Duration::from_secs(15 * 60);

#[derive(Debug)]
enum Assembly {
    Partial { expiry: Instant, chunks: Vec<MessageChunk> },
    Expired,
    Complete,
}

#[derive(Debug, Default)]
pub struct ChunkReassembler {
    assemblies: HashMap<TransactionId, Assembly>,
}

impl ChunkReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemblies tracked, including complete and expired markers.
    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }

    /// Assemblies still waiting for chunks.
    pub fn pending_len(&self) -> usize {
        self.assemblies
            .values()
            .filter(|assembly| matches!(assembly, Assembly::Partial { .. }))
            .count()
    }

    /// Feeds one raw item; returns a message once one is complete.
    pub fn push(&mut self, item: ConsensusTopicResponse) -> Result<Option<TopicMessage>> {
        self.push_at(item, Instant::now())
    }

    pub fn push_at(&mut self, item: ConsensusTopicResponse, now: Instant) -> Result<Option<TopicMessage>> {
        let consensus_timestamp = item
            .consensus_timestamp
            .ok_or_else(|| LedgerError::MalformedResponse("topic message without consensus_timestamp".to_string()))?;

        let header = MessageHeader {
            consensus_timestamp,
            sequence_number: item.sequence_number,
            running_hash: item.running_hash,
            running_hash_version: item.running_hash_version,
            message: item.message,
        };

        let info = match item.chunk_info {
            Some(info) if info.total > 1 => info,
            _ => return Ok(Some(TopicMessage::single(header))),
        };

        let transaction_id = info.initial_transaction_id.ok_or_else(|| {
            LedgerError::MalformedResponse("chunked topic message without initial_transaction_id".to_string())
        })?;

        self.expire(now);

        let assembly = self.assemblies.entry(transaction_id).or_insert_with(|| Assembly::Partial {
            expiry: now + CHUNK_EXPIRY,
            chunks: Vec::new(),
        });

        let Assembly::Partial { chunks, .. } = &mut *assembly else {
            debug!(
                transaction = %transaction_id,
                chunk = info.number,
                "dropping chunk of expired or completed message"
            );
            return Ok(None);
        };

        if !chunks.iter().any(|chunk| chunk.number == info.number) {
            chunks.push(MessageChunk {
                header,
                number: info.number,
                total: info.total,
            });
        }

        let total = chunks.iter().map(|chunk| chunk.total).min().unwrap_or(info.total);
        if (chunks.len() as i64) < i64::from(total) {
            return Ok(None);
        }

        let mut chunks = std::mem::take(chunks);
        *assembly = Assembly::Complete;

        chunks.sort_by_key(|chunk| chunk.number);
        Ok(TopicMessage::from_chunks(transaction_id, chunks))
    }

    /// Marks overdue assemblies expired, releasing their chunks.
    fn expire(&mut self, now: Instant) {
        for (transaction_id, assembly) in self.assemblies.iter_mut() {
            if matches!(assembly, Assembly::Partial { expiry, .. } if *expiry < now) {
                debug!(transaction = %transaction_id, "chunked message expired before completion");
                *assembly = Assembly::Expired;
            }
        }
    }
}
