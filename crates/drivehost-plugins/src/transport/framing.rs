//! `Content-Length` framing over byte streams.
//!
//! Each message on the plugin's stdio is prefixed by a header block:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

use super::error::TransportError;

/// Largest payload accepted in either direction.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const CONTENT_LENGTH: &str = "content-length:";

/// Reads framed messages from a byte stream.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wraps a reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Receives the next frame, blocking until it is complete.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between frames.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::MissingContentLength`] when the header block
    /// has no length, [`TransportError::InvalidHeader`] when the length does
    /// not parse, [`TransportError::FrameTooLarge`] above
    /// [`MAX_FRAME_BYTES`] and [`TransportError::Io`] when the stream fails
    /// or ends inside a frame.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let Some(length) = self.read_headers()? else {
            return Ok(None);
        };
        let mut content = vec![0_u8; length];
        self.reader.read_exact(&mut content)?;
        Ok(Some(content))
    }

    fn read_headers(&mut self) -> Result<Option<usize>, TransportError> {
        let mut content_length: Option<usize> = None;
        let mut saw_header = false;

        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line)?;
            if bytes_read == 0 {
                if saw_header {
                    return Err(TransportError::from(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream closed while reading headers",
                    )));
                }
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                if saw_header {
                    break;
                }
                continue;
            }
            saw_header = true;

            if let Some(value) = strip_content_length(trimmed) {
                let length = value
                    .trim()
                    .parse()
                    .map_err(|_| TransportError::InvalidHeader {
                        line: trimmed.to_owned(),
                    })?;
                content_length = Some(length);
            }
        }

        let length = content_length.ok_or(TransportError::MissingContentLength)?;
        if length > MAX_FRAME_BYTES {
            return Err(TransportError::FrameTooLarge {
                length,
                limit: MAX_FRAME_BYTES,
            });
        }
        Ok(Some(length))
    }
}

fn strip_content_length(line: &str) -> Option<&str> {
    let prefix = line.get(..CONTENT_LENGTH.len())?;
    if prefix.eq_ignore_ascii_case(CONTENT_LENGTH) {
        line.get(CONTENT_LENGTH.len()..)
    } else {
        None
    }
}

/// Writes framed messages to a byte stream.
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wraps a writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Sends one framed message and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::FrameTooLarge`] for oversized payloads and
    /// [`TransportError::Io`] if writing fails.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_FRAME_BYTES {
            return Err(TransportError::FrameTooLarge {
                length: payload.len(),
                limit: MAX_FRAME_BYTES,
            });
        }
        let header = format!("Content-Length: {}\r\n\r\n", payload.len());
        self.writer.write_all(header.as_bytes())?;
        self.writer.write_all(payload)?;
        self.writer.flush()?;
        Ok(())
    }
}
