//! ID3v2.4 tags written in front of engine output.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

use crate::pipeline::OutputMetadata;

const SCRATCH_SIZE: usize = 64 * 1024;

/// Largest size a synchsafe integer can hold.
const MAX_SYNCHSAFE: usize = (1 << 28) - 1;

/// Text encoding byte for UTF-8.
const ENCODING_UTF8: u8 = 0x03;

/// APIC picture type for a front cover.
const PICTURE_FRONT_COVER: u8 = 0x03;

/// Encodes an ID3v2.4 tag holding the title, artist and cover art of
/// `metadata`. Returns an empty vector when there is nothing to write.
pub fn encode_id3v2(metadata: &OutputMetadata) -> Vec<u8> {
    let mut frames = Vec::new();

    if let Some(title) = metadata.title.as_deref().filter(|t| !t.is_empty()) {
        push_text_frame(&mut frames, b"TIT2", title);
    }
    if let Some(artist) = metadata.artist.as_deref().filter(|a| !a.is_empty()) {
        push_text_frame(&mut frames, b"TPE1", artist);
    }
    if let Some(cover) = metadata.cover.as_deref() {
        if let Some(mime) = sniff_image_mime(cover) {
            let mut body = Vec::with_capacity(cover.len() + mime.len() + 4);
            body.push(ENCODING_UTF8);
            body.extend_from_slice(mime.as_bytes());
            body.push(0);
            body.push(PICTURE_FRONT_COVER);
            // empty description
            body.push(0);
            body.extend_from_slice(cover);
            push_frame(&mut frames, b"APIC", &body);
        }
    }

    if frames.is_empty() || frames.len() > MAX_SYNCHSAFE {
        return Vec::new();
    }

    let mut tag = Vec::with_capacity(10 + frames.len());
    tag.extend_from_slice(b"ID3");
    // version 2.4.0, no flags
    tag.extend_from_slice(&[4, 0, 0]);
    tag.extend_from_slice(&synchsafe(frames.len()));
    tag.extend_from_slice(&frames);
    tag
}

fn push_text_frame(frames: &mut Vec<u8>, id: &[u8; 4], text: &str) {
    let mut body = Vec::with_capacity(text.len() + 1);
    body.push(ENCODING_UTF8);
    body.extend_from_slice(text.as_bytes());
    push_frame(frames, id, &body);
}

fn push_frame(frames: &mut Vec<u8>, id: &[u8; 4], body: &[u8]) {
    if body.len() > MAX_SYNCHSAFE {
        return;
    }
    frames.extend_from_slice(id);
    frames.extend_from_slice(&synchsafe(body.len()));
    frames.extend_from_slice(&[0, 0]);
    frames.extend_from_slice(body);
}

fn synchsafe(n: usize) -> [u8; 4] {
    [
        ((n >> 21) & 0x7f) as u8,
        ((n >> 14) & 0x7f) as u8,
        ((n >> 7) & 0x7f) as u8,
        (n & 0x7f) as u8,
    ]
}

/// MIME type of an image, from its magic bytes.
pub fn sniff_image_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xff, 0xd8, 0xff]) {
        Some("image/jpeg")
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

enum State {
    /// Holding the header until the inner stream yields its first bytes.
    Waiting(Vec<u8>),
    Emitting { data: Vec<u8>, pos: usize },
    Passthrough,
}

/// Emits `header` in front of `inner`, but only once `inner` has produced
/// data. An inner stream that ends empty yields nothing.
pub struct PrependReader<R> {
    inner: R,
    state: State,
    scratch: Vec<u8>,
}

impl<R> PrependReader<R> {
    pub fn new(inner: R, header: Vec<u8>) -> Self {
        let state = if header.is_empty() {
            State::Passthrough
        } else {
            State::Waiting(header)
        };
        Self {
            inner,
            state,
            scratch: Vec::new(),
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for PrependReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if let State::Waiting(_) = this.state {
            if this.scratch.is_empty() {
                this.scratch = vec![0u8; SCRATCH_SIZE];
            }
            let mut scratch = ReadBuf::new(&mut this.scratch);
            match Pin::new(&mut this.inner).poll_read(cx, &mut scratch) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(())) => {
                    let first = scratch.filled().len();
                    let state = std::mem::replace(&mut this.state, State::Passthrough);
                    if first > 0 {
                        if let State::Waiting(mut data) = state {
                            data.extend_from_slice(&this.scratch[..first]);
                            this.state = State::Emitting { data, pos: 0 };
                        }
                    }
                    this.scratch = Vec::new();
                    if first == 0 {
                        return Poll::Ready(Ok(()));
                    }
                }
            }
        }

        if let State::Emitting { ref data, ref mut pos } = this.state {
            let n = buf.remaining().min(data.len() - *pos);
            buf.put_slice(&data[*pos..*pos + n]);
            *pos += n;
            if *pos == data.len() {
                this.state = State::Passthrough;
            }
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}
