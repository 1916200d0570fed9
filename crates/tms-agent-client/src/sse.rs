// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line framing and `data:` decoding for the agent event stream.
//!
//! Each agent event is a single `data: {json}` line. The response body is
//! framed with [`LinesCodec`], which reassembles lines split across chunks
//! and bounds how much an unterminated line may buffer.

use std::io;

use bytes::Buf;
use futures::{Stream, TryStreamExt};
use tms_core::AgentEvent;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

const DATA_PREFIX: &str = "data: ";

/// Longest line accepted from the agent, in bytes.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Frame a body byte stream into lines without their terminators.
///
/// A trailing line with no line feed is yielded at end of stream. A line
/// longer than `max_length` or one that is not UTF-8 yields an error, after
/// which the stream ends.
pub fn lines<S, B, E>(
    body: S,
    max_length: usize,
) -> impl Stream<Item = Result<String, LinesCodecError>>
where
    S: Stream<Item = Result<B, E>>,
    B: Buf,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let reader = StreamReader::new(body.map_err(io::Error::other));
    FramedRead::new(reader, LinesCodec::new_with_max_length(max_length))
}

/// Decode one line.
///
/// Returns `None` for blank lines and lines that are not `data:` records
/// (comments, `event:`, `id:`), and the JSON outcome otherwise.
pub fn parse_data_line(line: &str) -> Option<Result<AgentEvent, serde_json::Error>> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?;
    Some(serde_json::from_str(payload))
}
