//! Incremental decoding for callers that receive the stream in pieces.
//!
//! [`RoiDecodeContext::decode_pixels`] already stops and resumes at buffer
//! edges; what it cannot do is decode an opcode whose bytes straddle two
//! feeds. [`RoiStreamingDecoder`] adds the small carry buffer that bridges
//! those edges, so input may arrive in chunks of any size (down to one
//! byte at a time) and still produce the exact single-shot output.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use super::RoiDecodeContext;
#[cfg(feature = "alloc")]
use crate::{Channels, Descriptor};

#[cfg(feature = "alloc")]
#[derive(Debug, Clone)]
pub struct RoiStreamingDecoder {
    ctx: RoiDecodeContext,
    carry: Vec<u8>,
}

#[cfg(feature = "alloc")]
impl RoiStreamingDecoder {
    /// Decoder for the body of a stream described by `desc` (everything
    /// after the 14-byte header).
    pub fn new(desc: &Descriptor, out_channels: Channels) -> Self {
        Self {
            ctx: RoiDecodeContext::new(desc, out_channels),
            carry: Vec::new(),
        }
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.ctx.is_done()
    }

    #[inline]
    pub fn pixels_decoded(&self) -> u64 {
        self.ctx.pixels_decoded()
    }

    /// Feed the next chunk of stream bytes, writing decoded pixels to
    /// `output`. Returns the number of bytes written.
    ///
    /// `output` must have room for every pixel not yet emitted (the same
    /// contract as handing the decoder its full destination buffer and
    /// re-slicing between feeds); only then is the carry guaranteed to stay
    /// a few bytes long.
    pub fn feed(&mut self, input: &[u8], output: &mut [u8]) -> usize {
        let mut written = 0;
        let mut inpos = 0;

        // drain the carry first, topping it up so no opcode straddles the
        // old/new boundary
        while !self.carry.is_empty() && inpos < input.len() && !self.ctx.is_done() {
            let take = (input.len() - inpos).min(16);
            self.carry.extend_from_slice(&input[inpos..inpos + take]);
            inpos += take;

            let (consumed, wrote) = self.ctx.decode_pixels(&self.carry, &mut output[written..]);
            written += wrote;
            self.carry.drain(..consumed);
        }

        if inpos < input.len() && !self.ctx.is_done() {
            let (consumed, wrote) =
                self.ctx.decode_pixels(&input[inpos..], &mut output[written..]);
            written += wrote;
            inpos += consumed;
        }

        // stash whatever could not be decoded yet
        if inpos < input.len() && !self.ctx.is_done() {
            self.carry.extend_from_slice(&input[inpos..]);
        }

        written
    }

    /// Call once the input source is exhausted: distinguishes a finished
    /// image from a truncated stream.
    pub fn finish(&self) -> Result<(), super::DecodeError> {
        snafu::ensure!(
            self.ctx.is_done(),
            super::TruncatedSnafu {
                decoded: self.ctx.pixels_decoded(),
                expected: self.ctx.pixels_total(),
            }
        );
        Ok(())
    }
}

/// Decode a stream from a reader to a writer with bounded buffers.
///
/// Output leaves in windows of up to 128 Ki pixels; the unconsumed input
/// tail is slid to the front of the read buffer between refills.
#[cfg(feature = "std")]
pub fn decode_stream<R: std::io::Read, W: std::io::Write>(
    mut reader: R,
    channels: Option<Channels>,
    mut writer: W,
) -> Result<Descriptor, super::DecodeError> {
    use crate::HEADER_SIZE;
    use snafu::ResultExt;

    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).context(super::ReadIoSnafu)?;
    let desc = super::decode_header(&header)?;
    let out_channels = channels.unwrap_or(desc.channels);

    let mut ctx = RoiDecodeContext::new(&desc, out_channels);

    const OUT_WINDOW_PIXELS: usize = 128 * 1024;
    let mut inbuf = vec![0u8; 64 * 1024];
    let mut outbuf = vec![0u8; OUT_WINDOW_PIXELS * out_channels.bytes()];
    let mut filled = 0;

    while !ctx.is_done() {
        let n = reader.read(&mut inbuf[filled..]).context(super::ReadIoSnafu)?;
        filled += n;

        loop {
            let (consumed, written) = ctx.decode_pixels(&inbuf[..filled], &mut outbuf);
            writer
                .write_all(&outbuf[..written])
                .context(super::WriteIoSnafu)?;
            inbuf.copy_within(consumed..filled, 0);
            filled -= consumed;
            if written == 0 || ctx.is_done() {
                break;
            }
        }

        if n == 0 {
            // EOF
            snafu::ensure!(
                ctx.is_done(),
                super::TruncatedSnafu {
                    decoded: ctx.pixels_decoded(),
                    expected: ctx.pixels_total(),
                }
            );
        }
    }

    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode::RoiEncodeContext, Codepath, Colorspace, HEADER_SIZE};

    fn sample() -> (Descriptor, Vec<u8>, Vec<u8>) {
        let desc = Descriptor {
            width: 37,
            height: 11,
            channels: Channels::Rgba,
            colorspace: Colorspace::Srgb,
        };
        let mut pixels = vec![0u8; 37 * 11 * 4];
        for (i, b) in pixels.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(97) ^ (i >> 5) as u8;
        }
        let encoded =
            RoiEncodeContext::encode_to_vec(&pixels, &desc, Codepath::Scalar).unwrap();
        (desc, pixels, encoded)
    }

    #[test]
    fn byte_at_a_time_matches_single_shot() {
        let (desc, pixels, encoded) = sample();

        let mut decoder = RoiStreamingDecoder::new(&desc, Channels::Rgba);
        let mut out = vec![0u8; pixels.len()];
        let mut written = 0;
        for byte in &encoded[HEADER_SIZE..] {
            written += decoder.feed(core::slice::from_ref(byte), &mut out[written..]);
        }
        decoder.finish().unwrap();
        assert_eq!(written, pixels.len());
        assert_eq!(out, pixels);
    }

    #[test]
    fn odd_chunk_sizes_match_single_shot() {
        let (desc, pixels, encoded) = sample();

        for chunk in [2usize, 3, 5, 7, 64, 511] {
            let mut decoder = RoiStreamingDecoder::new(&desc, Channels::Rgba);
            let mut out = vec![0u8; pixels.len()];
            let mut written = 0;
            for piece in encoded[HEADER_SIZE..].chunks(chunk) {
                written += decoder.feed(piece, &mut out[written..]);
            }
            decoder.finish().unwrap();
            assert_eq!(out, pixels, "chunk size {chunk}");
        }
    }

    #[test]
    fn truncated_stream_fails_finish() {
        let (desc, pixels, encoded) = sample();

        let mut decoder = RoiStreamingDecoder::new(&desc, Channels::Rgba);
        let mut out = vec![0u8; pixels.len()];
        let body = &encoded[HEADER_SIZE..];
        decoder.feed(&body[..body.len() / 2], &mut out);
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn reader_to_writer_roundtrip() {
        let (_desc, pixels, encoded) = sample();

        let mut out = Vec::new();
        let desc = decode_stream(encoded.as_slice(), None, &mut out).unwrap();
        assert_eq!(desc.width, 37);
        assert_eq!(out, pixels);
    }
}
