//! Point-to-point transaction fetch protocol.
//!
//! Request: the raw 32-byte transaction id.
//! Response: one result byte, followed on success by the snappy-framed body.

use std::io;
use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use containers::{TX_ID_LEN, TransactionBody, TransactionId};
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::request_response::{
    Behaviour as RequestResponse, Codec, Config, Event, ProtocolSupport,
};
use snap::read::FrameDecoder;
use snap::write::FrameEncoder;

/// Largest transaction body served or accepted.
pub const MAX_TRANSACTION_SIZE: usize = 1024 * 1024;

pub const TX_BY_ID_PROTOCOL_V1: &str = "/gossipnode/req/tx_by_id/1/snappy";

pub const RESULT_SUCCESS: u8 = 0;
pub const RESULT_RESOURCE_UNAVAILABLE: u8 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TxProtocol(pub String);

impl AsRef<str> for TxProtocol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest(pub TransactionId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResponse {
    Found(TransactionBody),
    NotFound,
}

#[derive(Clone, Default)]
pub struct TxCodec;

impl TxCodec {
    /// Compress data using Snappy framing format
    fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = FrameEncoder::new(Vec::new());
        encoder.write_all(data)?;
        encoder
            .into_inner()
            .map_err(|e| io::Error::other(format!("Snappy framing failed: {e}")))
    }

    /// Decompress data using Snappy framing format, refusing to inflate past
    /// [`MAX_TRANSACTION_SIZE`].
    fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut decoder = FrameDecoder::new(data).take(MAX_TRANSACTION_SIZE as u64 + 1);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        if decompressed.len() > MAX_TRANSACTION_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("transaction body exceeds {MAX_TRANSACTION_SIZE} bytes"),
            ));
        }
        Ok(decompressed)
    }

    pub fn encode_request(request: &TxRequest) -> Vec<u8> {
        request.0.as_bytes().to_vec()
    }

    pub fn decode_request(data: &[u8]) -> io::Result<TxRequest> {
        TransactionId::from_slice(data).map(TxRequest).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {TX_ID_LEN}-byte transaction id, got {} bytes", data.len()),
            )
        })
    }

    pub fn encode_response(response: &TxResponse) -> io::Result<Vec<u8>> {
        match response {
            TxResponse::Found(body) => {
                if body.len() > MAX_TRANSACTION_SIZE {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("transaction body exceeds {MAX_TRANSACTION_SIZE} bytes"),
                    ));
                }
                let mut bytes = vec![RESULT_SUCCESS];
                bytes.extend(Self::compress(body.as_bytes())?);
                Ok(bytes)
            }
            TxResponse::NotFound => Ok(vec![RESULT_RESOURCE_UNAVAILABLE]),
        }
    }

    pub fn decode_response(data: &[u8]) -> io::Result<TxResponse> {
        match data.split_first() {
            Some((&RESULT_SUCCESS, payload)) => {
                Ok(TxResponse::Found(TransactionBody::new(Self::decompress(payload)?)))
            }
            Some((&RESULT_RESOURCE_UNAVAILABLE, _)) => Ok(TxResponse::NotFound),
            Some((code, _)) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown response code {code}"),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "empty transaction response",
            )),
        }
    }
}

#[async_trait]
impl Codec for TxCodec {
    type Protocol = TxProtocol;
    type Request = TxRequest;
    type Response = TxResponse;

    async fn read_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
    ) -> io::Result<Self::Request>
    where
        T: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        io.take(TX_ID_LEN as u64 + 1).read_to_end(&mut data).await?;
        Self::decode_request(&data)
    }

    async fn read_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
    ) -> io::Result<Self::Response>
    where
        T: AsyncRead + Unpin + Send,
    {
        // Framing overhead never doubles the payload.
        let limit = 2 * MAX_TRANSACTION_SIZE as u64;
        let mut data = Vec::new();
        io.take(limit).read_to_end(&mut data).await?;
        Self::decode_response(&data)
    }

    async fn write_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        request: Self::Request,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        io.write_all(&Self::encode_request(&request)).await?;
        io.close().await
    }

    async fn write_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        response: Self::Response,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        let data = Self::encode_response(&response)?;
        io.write_all(&data).await?;
        io.close().await
    }
}

pub type ReqResp = RequestResponse<TxCodec>;

pub type ReqRespMessage = Event<TxRequest, TxResponse>;

pub fn build(protocols: impl IntoIterator<Item = String>, request_timeout: Duration) -> ReqResp {
    let protocols = protocols
        .into_iter()
        .map(|name| (TxProtocol(name), ProtocolSupport::Full))
        .collect::<Vec<_>>();

    RequestResponse::with_codec(
        TxCodec,
        protocols,
        Config::default().with_request_timeout(request_timeout),
    )
}
