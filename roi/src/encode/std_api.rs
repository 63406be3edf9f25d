use super::{
    validate_descriptor, EncodeError, PixelSizeMismatchSnafu, ReadIoSnafu, RoiEncodeContext,
    WriteIoSnafu, WINDOW,
};
use crate::{utils::write_header, Channels, Codepath, Descriptor, HEADER_SIZE};
use snafu::{ensure, ResultExt};
use std::io::{Read, Write};

/// Scratch sized for one window at worst case, plus slack for the SIMD
/// writer's 16-byte stores.
fn window_scratch(channels: Channels) -> Vec<u8> {
    let worst = match channels {
        Channels::Rgb => 4,
        Channels::Rgba => 6,
    };
    vec![0u8; WINDOW * worst + 16]
}

impl RoiEncodeContext {
    /// Encode a full raw pixel buffer to a writer.
    ///
    /// Produces exactly the bytes of
    /// [`encode_to_vec`](RoiEncodeContext::encode_to_vec) without holding
    /// the whole stream in memory: each window is encoded into a scratch
    /// buffer and written out.
    pub fn encode<W: Write>(
        pixels: &[u8],
        desc: &Descriptor,
        codepath: Codepath,
        mut w: W,
    ) -> Result<(), EncodeError> {
        validate_descriptor(desc)?;
        let expected = desc.pixel_count() as usize * desc.channels.bytes();
        ensure!(
            pixels.len() == expected,
            PixelSizeMismatchSnafu {
                expected,
                actual: pixels.len(),
            }
        );

        Self::encode_header(desc, &mut w)?;

        let ch = desc.channels.bytes();
        let pixel_cnt = desc.pixel_count() as usize;
        let mut scratch = window_scratch(desc.channels);
        let mut state = RoiEncodeContext::new();

        let mut done = 0;
        while done < pixel_cnt {
            let take = (pixel_cnt - done).min(WINDOW);
            let mut p = 0;
            state.encode_pixels(
                &pixels[done * ch..(done + take) * ch],
                &mut scratch,
                &mut p,
                desc.channels,
                codepath,
            );
            w.write_all(&scratch[..p]).context(WriteIoSnafu)?;
            done += take;
        }

        let mut p = 0;
        state.finish(&mut scratch, &mut p);
        w.write_all(&scratch[..p]).context(WriteIoSnafu)
    }

    /// Write just the 14-byte header.
    pub fn encode_header<W: Write>(desc: &Descriptor, mut w: W) -> Result<(), EncodeError> {
        let mut header = [0u8; HEADER_SIZE];
        write_header(&mut header, desc);
        w.write_all(&header).context(WriteIoSnafu)
    }

    /// Streaming encode: pull raw pixels a window at a time from `reader`
    /// and push encoded bytes to `w`. The reader must yield exactly
    /// `width * height * channels` bytes; running dry mid-image surfaces
    /// as a read error.
    pub fn encode_stream<R: Read, W: Write>(
        mut reader: R,
        desc: &Descriptor,
        codepath: Codepath,
        mut w: W,
    ) -> Result<(), EncodeError> {
        validate_descriptor(desc)?;
        Self::encode_header(desc, &mut w)?;

        let ch = desc.channels.bytes();
        let pixel_cnt = desc.pixel_count() as usize;
        let mut inbuf = vec![0u8; WINDOW * ch];
        let mut scratch = window_scratch(desc.channels);
        let mut state = RoiEncodeContext::new();

        let mut done = 0;
        while done < pixel_cnt {
            let take = (pixel_cnt - done).min(WINDOW);
            let window = &mut inbuf[..take * ch];
            reader.read_exact(window).context(ReadIoSnafu)?;
            let mut p = 0;
            state.encode_pixels(window, &mut scratch, &mut p, desc.channels, codepath);
            w.write_all(&scratch[..p]).context(WriteIoSnafu)?;
            done += take;
        }

        let mut p = 0;
        state.finish(&mut scratch, &mut p);
        w.write_all(&scratch[..p]).context(WriteIoSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Colorspace;

    #[test]
    fn writer_and_vec_paths_agree() {
        let desc = Descriptor {
            width: 61,
            height: 5,
            channels: Channels::Rgba,
            colorspace: Colorspace::Linear,
        };
        let mut pixels = vec![0u8; 61 * 5 * 4];
        for (i, b) in pixels.iter_mut().enumerate() {
            *b = ((i * 2654435761usize) >> 13) as u8;
        }

        let via_vec =
            RoiEncodeContext::encode_to_vec(&pixels, &desc, Codepath::Scalar).unwrap();

        let mut via_writer = Vec::new();
        RoiEncodeContext::encode(&pixels, &desc, Codepath::Scalar, &mut via_writer).unwrap();
        assert_eq!(via_vec, via_writer);

        let mut via_stream = Vec::new();
        RoiEncodeContext::encode_stream(
            pixels.as_slice(),
            &desc,
            Codepath::Scalar,
            &mut via_stream,
        )
        .unwrap();
        assert_eq!(via_vec, via_stream);
    }

    #[test]
    fn short_reader_is_an_error() {
        let desc = Descriptor {
            width: 4,
            height: 4,
            channels: Channels::Rgb,
            colorspace: Colorspace::Srgb,
        };
        let short = [0u8; 10];
        let err = RoiEncodeContext::encode_stream(
            short.as_slice(),
            &desc,
            Codepath::Scalar,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::ReadIo { .. }));
    }
}
