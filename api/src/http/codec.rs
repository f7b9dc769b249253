use std::{fmt::Write, str::from_utf8};

use bytes::{Buf, BytesMut};
use http::{header::CONTENT_LENGTH, request::Builder, Error as HttpError, Method, Uri, Version};
use memchr::memmem;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    error::{RequestError, ResponseError},
    http::{LINE_DELIMITER, REQUEST_DELIMITER},
};

use super::{Request, Response};

const MAX_HEAD_LEN: usize = 8 * 1024;
const MAX_BODY_LEN: usize = 64 * 1024;

/// HTTP/1.x framing: one request per head, body sized by `Content-Length`.
/// Bytes past the body stay buffered for the next request.
#[derive(Default)]
pub struct ConnectionCodec {
    pending: Option<(Builder, usize)>,
}

impl Decoder for ConnectionCodec {
    type Item = Request;

    type Error = RequestError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (req, len) = match self.pending.take() {
            Some(pending) => pending,
            None => {
                let Some(position) = memmem::find(&src[..], REQUEST_DELIMITER) else {
                    if src.len() > MAX_HEAD_LEN {
                        return Err(RequestError::HeadTooLarge);
                    }
                    return Ok(None);
                };

                let head = src.split_to(position);
                src.advance(REQUEST_DELIMITER.len());
                let req = request_from_head(&head)?;

                let len = match req.headers_ref().and_then(|map| map.get(CONTENT_LENGTH)) {
                    Some(value) => value.to_str()?.trim().parse::<usize>()?,
                    None => 0,
                };
                if len > MAX_BODY_LEN {
                    return Err(RequestError::BodyTooLarge(len));
                }

                (req, len)
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            self.pending = Some((req, len));
            return Ok(None);
        }

        let body = (len > 0).then(|| src.split_to(len).freeze());
        req.body(body).map(Some).map_err(RequestError::HttpError)
    }
}

fn request_from_head(head: &[u8]) -> Result<Builder, RequestError> {
    let head = from_utf8(head)?;
    let mut lines = head.split(LINE_DELIMITER);

    // request line = "METHOD PATH HTTP/VERSION"
    let request_line = lines.next().ok_or(RequestError::InvalidFormat)?;
    let mut parts = request_line.split(' ');
    let (Some(method), Some(path), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(RequestError::InvalidFormat);
    };

    let mut builder = http::Request::builder()
        .method(Method::try_from(method).map_err(HttpError::from)?)
        .uri(Uri::try_from(path).map_err(HttpError::from)?)
        .version(match version {
            "HTTP/1.0" => Version::HTTP_10,
            "HTTP/1.1" => Version::HTTP_11,
            _ => return Err(RequestError::UnsupportedVersion),
        });

    // header = "Name: Value"
    for header in lines.filter(|line| !line.is_empty()) {
        let (name, value) = header.split_once(':').ok_or(RequestError::InvalidFormat)?;
        builder = builder.header(name, value.trim());
    }

    Ok(builder)
}

impl Encoder<Response> for ConnectionCodec {
    type Error = ResponseError;

    fn encode(&mut self, response: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write!(dst, "{:?} {}\r\n", response.version(), response.status())?;

        for (key, value) in response.headers() {
            write!(dst, "{}: {}\r\n", key, value.to_str()?)?;
        }

        if !response.headers().contains_key(CONTENT_LENGTH) {
            let len = response.body().as_ref().map_or(0, |b| b.len());
            write!(dst, "{}: {}\r\n", CONTENT_LENGTH, len)?;
        }

        dst.extend_from_slice(LINE_DELIMITER.as_bytes());

        if let Some(body) = response.body() {
            dst.extend_from_slice(body);
        }

        Ok(())
    }
}
