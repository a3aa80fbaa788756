use std::io::{Error, ErrorKind};

use libp2p::gossipsub::{DataTransform, Message, RawMessage, TopicHash};
use snap::raw::{Decoder, Encoder, decompress_len};

use crate::gossipsub::config::MAX_TRANSMIT_SIZE;

/// Snappy block compression for gossip payloads.
///
/// Inbound payloads whose declared decompressed size exceeds `max_len` are
/// rejected before any allocation.
pub struct Compressor {
    max_len: usize,
}

impl Compressor {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(MAX_TRANSMIT_SIZE)
    }
}

impl DataTransform for Compressor {
    fn inbound_transform(&self, raw_message: RawMessage) -> Result<Message, Error> {
        let len = decompress_len(&raw_message.data)?;
        if len > self.max_len {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("decompressed gossip payload too large: {len} > {}", self.max_len),
            ));
        }

        let data = Decoder::new().decompress_vec(&raw_message.data)?;

        Ok(Message {
            topic: raw_message.topic,
            data,
            sequence_number: raw_message.sequence_number,
            source: raw_message.source,
        })
    }

    fn outbound_transform(&self, _topic: &TopicHash, data: Vec<u8>) -> Result<Vec<u8>, Error> {
        Ok(Encoder::new().compress_vec(&data)?)
    }
}
