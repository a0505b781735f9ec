use std::fmt;
use std::io::{BufRead, Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::protocol::error::{Result, SearchwireError};
use crate::protocol::{Method, RestRequest, RestResponse, Status};
use crate::server::Server;

/// Largest response body or frame either codec will accept (100 MB).
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Longest status, header, chunk-size or trailer line accepted (64 KiB).
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Total bytes of status lines and headers accepted per response, interim
/// 1xx responses included. Trailers get a budget of the same size.
pub const MAX_HEAD_SIZE: usize = 256 * 1024;

/// Wire encoding spoken by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireProtocol {
    /// HTTP/1.1 text requests against the REST endpoint
    #[default]
    Http,
    /// Length-prefixed binary frames against the framed endpoint
    Framed,
}

impl WireProtocol {
    /// Port the cluster conventionally listens on for this protocol.
    pub fn default_port(&self) -> u16 {
        match self {
            WireProtocol::Http => 9200,
            WireProtocol::Framed => 9500,
        }
    }
}

impl fmt::Display for WireProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireProtocol::Http => f.write_str("http"),
            WireProtocol::Framed => f.write_str("framed"),
        }
    }
}

impl FromStr for WireProtocol {
    type Err = SearchwireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(WireProtocol::Http),
            "framed" | "thrift" => Ok(WireProtocol::Framed),
            other => Err(SearchwireError::Configuration(format!(
                "Unknown wire protocol '{}' (expected 'http' or 'framed')",
                other
            ))),
        }
    }
}

/// Codec for putting requests on the wire and reading responses back.
///
/// The provider and executor never look inside: they hand the codec to
/// each connection and the connection drives it.
///
/// # Example
///
/// ```
/// use searchwire_common::{Method, RestRequest, Server};
/// use searchwire_common::transport::{Codec, WireProtocol};
///
/// let codec = Codec::for_protocol(WireProtocol::Http);
/// let request = RestRequest::new(Method::Get, "/_status");
/// let bytes = codec.encode_request(&request, &Server::new("localhost", 9200)).unwrap();
/// assert!(bytes.starts_with(b"GET /_status HTTP/1.1\r\n"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Http(HttpCodec),
    Framed(FramedCodec),
}

impl Codec {
    pub fn for_protocol(protocol: WireProtocol) -> Self {
        match protocol {
            WireProtocol::Http => Codec::Http(HttpCodec),
            WireProtocol::Framed => Codec::Framed(FramedCodec),
        }
    }

    pub fn protocol(&self) -> WireProtocol {
        match self {
            Codec::Http(_) => WireProtocol::Http,
            Codec::Framed(_) => WireProtocol::Framed,
        }
    }

    /// Encode a request into the exact bytes to write on the socket
    pub fn encode_request(&self, request: &RestRequest, server: &Server) -> Result<Vec<u8>> {
        match self {
            Codec::Http(_) => HttpCodec::encode_request(request, server),
            Codec::Framed(_) => FramedCodec::encode_request(request),
        }
    }

    /// Read one complete response
    ///
    /// `method` is the method of the request being answered; HTTP needs it
    /// to know that a HEAD response has no body.
    pub fn read_response<R: BufRead>(&self, reader: &mut R, method: Method) -> Result<RestResponse> {
        match self {
            Codec::Http(_) => HttpCodec::read_response(reader, method),
            Codec::Framed(_) => FramedCodec::read_response(reader),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Codec::for_protocol(WireProtocol::default())
    }
}

/// HTTP/1.1 codec
///
/// Every request carries `Connection: close`: connections live for a single
/// exchange, so a response without a length is read until end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HttpCodec;

impl HttpCodec {
    /// # Errors
    ///
    /// `InvalidRequest` when the path contains whitespace or control
    /// characters, which would break the request line.
    pub fn encode_request(request: &RestRequest, server: &Server) -> Result<Vec<u8>> {
        let path = request.normalized_path();
        if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SearchwireError::InvalidRequest(format!(
                "Request path {:?} contains whitespace or control characters",
                path
            )));
        }

        let body = request.body.as_deref().unwrap_or("");
        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n",
            request.method, path, server
        );
        if request.body.is_some() {
            head.push_str("Content-Type: application/json\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body.as_bytes());
        Ok(bytes)
    }

    pub fn read_response<R: BufRead>(reader: &mut R, method: Method) -> Result<RestResponse> {
        let mut budget = MAX_HEAD_SIZE;
        // Skip interim 1xx responses (e.g. 100 Continue).
        let (status, headers) = loop {
            let status = Self::read_status_line(reader, &mut budget)?;
            let headers = Self::read_headers(reader, &mut budget)?;
            if status.code() >= 200 || status.code() == 101 {
                break (status, headers);
            }
        };

        if method == Method::Head || status.forbids_body() {
            return Ok(RestResponse::new(status, None));
        }

        let body = if headers.chunked {
            Self::read_chunked(reader)?
        } else if let Some(len) = headers.content_length {
            if len > MAX_MESSAGE_SIZE {
                return Err(too_large(len));
            }
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf)?;
            buf
        } else {
            let mut buf = Vec::new();
            reader.take(MAX_MESSAGE_SIZE as u64 + 1).read_to_end(&mut buf)?;
            if buf.len() > MAX_MESSAGE_SIZE {
                return Err(too_large(buf.len()));
            }
            buf
        };

        Ok(RestResponse::from_bytes(status, body))
    }

    fn read_status_line<R: BufRead>(reader: &mut R, budget: &mut usize) -> Result<Status> {
        let line = read_line(reader, budget)?.ok_or_else(|| {
            SearchwireError::InvalidResponse(
                "Connection closed before a status line was received".to_string(),
            )
        })?;

        let mut parts = line.split_whitespace();
        let version = parts.next().unwrap_or("");
        if !version.starts_with("HTTP/") {
            return Err(SearchwireError::InvalidResponse(format!(
                "Malformed status line '{}'",
                line
            )));
        }

        let code = parts
            .next()
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| {
                SearchwireError::InvalidResponse(format!("Malformed status code in '{}'", line))
            })?;

        Ok(Status::from_code(code))
    }

    fn read_headers<R: BufRead>(reader: &mut R, budget: &mut usize) -> Result<ResponseHeaders> {
        let mut headers = ResponseHeaders::default();
        loop {
            let line = read_line(reader, budget)?.ok_or_else(|| {
                SearchwireError::InvalidResponse("Connection closed inside headers".to_string())
            })?;
            if line.is_empty() {
                return Ok(headers);
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(SearchwireError::InvalidResponse(format!(
                    "Malformed header line '{}'",
                    line
                )));
            };
            let value = value.trim();

            if name.eq_ignore_ascii_case("content-length") {
                let len = value.parse::<usize>().map_err(|_| {
                    SearchwireError::InvalidResponse(format!("Invalid Content-Length '{}'", value))
                })?;
                headers.content_length = Some(len);
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                headers.chunked = value
                    .split(',')
                    .any(|enc| enc.trim().eq_ignore_ascii_case("chunked"));
            }
        }
    }

    fn read_chunked<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        loop {
            let mut budget = MAX_LINE_LENGTH;
            let line = read_line(reader, &mut budget)?.ok_or_else(|| {
                SearchwireError::InvalidResponse("Connection closed inside chunked body".to_string())
            })?;
            let size_hex = line.split(';').next().unwrap_or("").trim();
            let size = usize::from_str_radix(size_hex, 16).map_err(|_| {
                SearchwireError::InvalidResponse(format!("Invalid chunk size '{}'", size_hex))
            })?;

            if size == 0 {
                // Trailers end with an empty line.
                let mut budget = MAX_HEAD_SIZE;
                while let Some(trailer) = read_line(reader, &mut budget)? {
                    if trailer.is_empty() {
                        break;
                    }
                }
                return Ok(body);
            }

            let start = body.len();
            let end = start
                .checked_add(size)
                .filter(|end| *end <= MAX_MESSAGE_SIZE)
                .ok_or_else(|| too_large(start.saturating_add(size)))?;
            body.resize(end, 0);
            reader.read_exact(&mut body[start..])?;

            // CRLF after each chunk
            budget = MAX_LINE_LENGTH;
            read_line(reader, &mut budget)?;
        }
    }
}

#[derive(Debug, Default)]
struct ResponseHeaders {
    content_length: Option<usize>,
    chunked: bool,
}

/// Request frame of the framed protocol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestFrame {
    pub method: Method,
    pub uri: String,
    pub body: Option<String>,
}

/// Response frame of the framed protocol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseFrame {
    pub status: u16,
    pub body: Option<String>,
}

/// Length-prefixed framed codec
///
/// Wire format: `[4-byte length as u32 big-endian] + [JSON frame]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramedCodec;

impl FramedCodec {
    /// Encode a request as a complete frame, length prefix included.
    pub fn encode_request(request: &RestRequest) -> Result<Vec<u8>> {
        let frame = RequestFrame {
            method: request.method,
            uri: request.normalized_path(),
            body: request.body.clone(),
        };
        Self::frame(&serde_json::to_vec(&frame)?)
    }

    /// Encode a response as a complete frame (used by framed servers).
    pub fn encode_response(frame: &ResponseFrame) -> Result<Vec<u8>> {
        Self::frame(&serde_json::to_vec(frame)?)
    }

    pub fn decode_request(data: &[u8]) -> Result<RequestFrame> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn read_response<R: Read>(reader: &mut R) -> Result<RestResponse> {
        let data = Self::read_frame(reader)?;
        let frame: ResponseFrame = serde_json::from_slice(&data).map_err(|e| {
            SearchwireError::InvalidResponse(format!("Malformed response frame: {}", e))
        })?;
        Ok(RestResponse::new(Status::from_code(frame.status), frame.body))
    }

    /// Write a length prefix and payload.
    pub fn write_frame<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
        writer.write_all(&Self::frame(data)?)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one frame payload.
    pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;

        let len = u32::from_be_bytes(len_buf) as usize;

        // Validate length to prevent allocation of excessively large buffers
        if len > MAX_MESSAGE_SIZE {
            return Err(too_large(len));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn frame(payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(SearchwireError::InvalidRequest(format!(
                "Frame too large: {} bytes (max {} bytes)",
                payload.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        let mut bytes = Vec::with_capacity(4 + payload.len());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(payload);
        Ok(bytes)
    }
}

/// Reads one line, stripping the line terminator. `None` at end of stream.
///
/// A line may not exceed `MAX_LINE_LENGTH` or what is left of `budget`;
/// the bytes read are charged to `budget`.
fn read_line<R: BufRead>(reader: &mut R, budget: &mut usize) -> Result<Option<String>> {
    let limit = MAX_LINE_LENGTH.min(*budget);
    let mut line = String::new();
    let read = reader.by_ref().take(limit as u64 + 1).read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if read > limit {
        return Err(SearchwireError::InvalidResponse(format!(
            "Response line or header block exceeds {} bytes",
            limit
        )));
    }
    *budget -= read;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

fn too_large(len: usize) -> SearchwireError {
    SearchwireError::InvalidResponse(format!(
        "Message too large: {} bytes (max {} bytes)",
        len, MAX_MESSAGE_SIZE
    ))
}
