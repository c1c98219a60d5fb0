use futures::stream::{self, BoxStream, StreamExt};
use ledgerpc_common::messages::{methods, ConsensusTopicQuery, ConsensusTopicResponse};
use ledgerpc_common::{Result, Timestamp, TopicId, TransactionId};
use serde::Serialize;
use serde_json::Value;

use crate::mirror::{MirrorContext, MirrorRequest};
use crate::reassembly::ChunkReassembler;

/// Subscribes to the messages of a consensus topic, reassembling chunked
/// messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicMessageQuery {
    pub topic_id: Option<TopicId>,
    /// Earliest consensus timestamp to deliver. Unset starts at the current time.
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// Maximum number of raw items the mirror sends. Zero is unlimited.
    pub limit: u64,
}

impl TopicMessageQuery {
    pub fn new(topic_id: TopicId) -> Self {
        Self {
            topic_id: Some(topic_id),
            ..Self::default()
        }
    }

    pub fn with_start_time(mut self, start_time: Timestamp) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_end_time(mut self, end_time: Timestamp) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }
}

/// Resume point of a topic subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicContext {
    /// Consensus timestamp of the last raw item received.
    pub last_consensus_timestamp: Option<Timestamp>,
}

impl MirrorContext<ConsensusTopicResponse> for TopicContext {
    fn update(&mut self, item: &ConsensusTopicResponse) {
        if let Some(timestamp) = item.consensus_timestamp {
            self.last_consensus_timestamp = Some(timestamp);
        }
    }
}

impl MirrorRequest for TopicMessageQuery {
    type GrpcItem = ConsensusTopicResponse;
    type Context = TopicContext;
    type Item = TopicMessage;

    const METHOD: &'static str = methods::SUBSCRIBE_TOPIC;

    fn make_query(&self, context: &Self::Context) -> Result<Value> {
        let consensus_start_time = context
            .last_consensus_timestamp
            .map(|last| last.plus_nanos(1))
            .or(self.start_time);

        let query = ConsensusTopicQuery {
            topic_id: self.topic_id,
            consensus_start_time,
            consensus_end_time: self.end_time,
            limit: self.limit,
        };
        Ok(serde_json::to_value(query)?)
    }

    fn make_item_stream(raw: BoxStream<'static, Result<Self::GrpcItem>>) -> BoxStream<'static, Result<Self::Item>> {
        stream::unfold(Some((raw, ChunkReassembler::new())), |state| async move {
            let (mut raw, mut reassembler) = state?;
            loop {
                let pushed = match raw.next().await? {
                    Ok(item) => reassembler.push(item),
                    Err(e) => Err(e),
                };

                match pushed {
                    Ok(Some(message)) => return Some((Ok(message), Some((raw, reassembler)))),
                    Ok(None) => continue,
                    Err(e) => return Some((Err(e), None)),
                }
            }
        })
        .boxed()
    }
}

/// Header fields of one raw topic item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MessageHeader {
    pub consensus_timestamp: Timestamp,
    pub sequence_number: u64,
    pub running_hash: Vec<u8>,
    pub running_hash_version: u64,
    pub message: Vec<u8>,
}

/// One part of a chunked message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MessageChunk {
    pub header: MessageHeader,
    pub number: i32,
    pub total: i32,
}

/// Summary of one chunk of a reassembled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicMessageChunk {
    pub consensus_timestamp: Timestamp,
    pub content_size: usize,
    pub running_hash: Vec<u8>,
    pub sequence_number: u64,
}

/// A logical topic message.
///
/// For a chunked message the header fields come from the last chunk and
/// `contents` is the concatenation of every chunk in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicMessage {
    pub consensus_timestamp: Timestamp,
    pub contents: Vec<u8>,
    pub running_hash: Vec<u8>,
    pub running_hash_version: u64,
    pub sequence_number: u64,
    /// `None` for a single-part message.
    pub chunks: Option<Vec<TopicMessageChunk>>,
    /// Initial transaction id of a chunked message.
    pub transaction: Option<TransactionId>,
}

impl TopicMessage {
    pub(crate) fn single(header: MessageHeader) -> Self {
        Self {
            consensus_timestamp: header.consensus_timestamp,
            contents: header.message,
            running_hash: header.running_hash,
            running_hash_version: header.running_hash_version,
            sequence_number: header.sequence_number,
            chunks: None,
            transaction: None,
        }
    }

    /// `chunks` must be non-empty and sorted by chunk number.
    pub(crate) fn from_chunks(transaction: TransactionId, chunks: Vec<MessageChunk>) -> Option<Self> {
        let last = chunks.last()?.header.clone();

        let summaries = chunks
            .iter()
            .map(|chunk| TopicMessageChunk {
                consensus_timestamp: chunk.header.consensus_timestamp,
                content_size: chunk.header.message.len(),
                running_hash: chunk.header.running_hash.clone(),
                sequence_number: chunk.header.sequence_number,
            })
            .collect();

        let contents = chunks.into_iter().flat_map(|chunk| chunk.header.message).collect();

        Some(Self {
            consensus_timestamp: last.consensus_timestamp,
            contents,
            running_hash: last.running_hash,
            running_hash_version: last.running_hash_version,
            sequence_number: last.sequence_number,
            chunks: Some(summaries),
            transaction: Some(transaction),
        })
    }
}
