//! Table-driven encoder: every `(vg_r, vg, vg_b)` triple pre-encoded.
//!
//! A pure space/time trade against the scalar kernel: the table's output
//! is bit-identical, the opcode selection just happened at build time. The
//! table weighs in around 80 MiB, so it is built once by the caller and
//! shared by reference; the encoder itself never initialises it.

use super::{
    dump_run, emit_diff_op, validate_descriptor, EncodeError, PixelSizeMismatchSnafu,
    RoiEncodeContext,
};
use crate::{
    consts::ROI_OP_RGBA,
    utils::{write_header, Pixel},
    Channels, Descriptor, HEADER_SIZE,
};
use alloc::{boxed::Box, vec::Vec};
use snafu::ensure;

/// One pre-encoded RGB-family op: length byte followed by up to four
/// payload bytes.
type Entry = [u8; 5];

/// Lookup table from every possible diff triple to its encoded bytes.
pub struct EncodeLut {
    entries: Box<[Entry]>,
}

impl EncodeLut {
    /// Build the full table by running the scalar op selection over all
    /// 2^24 diff triples. Allocates ~80 MiB.
    pub fn build() -> Self {
        let mut entries = alloc::vec![[0u8; 5]; 1 << 24].into_boxed_slice();
        for (idx, entry) in entries.iter_mut().enumerate() {
            let vg_r = (idx >> 16) as u8 as i8;
            let vg = (idx >> 8) as u8 as i8;
            let vg_b = idx as u8 as i8;
            // cursor 1 leaves room for the length byte
            let mut len = 1;
            emit_diff_op(&mut entry[..], &mut len, vg, vg_r, vg_b);
            entry[0] = (len - 1) as u8;
        }
        Self { entries }
    }

    #[inline(always)]
    fn entry(&self, vg: i8, vg_r: i8, vg_b: i8) -> &Entry {
        let idx =
            ((vg_r as u8 as usize) << 16) | ((vg as u8 as usize) << 8) | (vg_b as u8 as usize);
        &self.entries[idx]
    }

    /// Encode a raw pixel buffer through the table. Same contract and same
    /// output bytes as [`RoiEncodeContext::encode_to_vec`].
    pub fn encode_to_vec(
        &self,
        pixels: &[u8],
        desc: &Descriptor,
    ) -> Result<Vec<u8>, EncodeError> {
        validate_descriptor(desc)?;
        let expected = desc.pixel_count() as usize * desc.channels.bytes();
        ensure!(
            pixels.len() == expected,
            PixelSizeMismatchSnafu {
                expected,
                actual: pixels.len(),
            }
        );

        let mut bytes = alloc::vec![0u8; desc.max_encoded_size()];
        write_header(&mut bytes, desc);
        let mut p = HEADER_SIZE;

        let mut state = RoiEncodeContext::new();
        let pixel_cnt = desc.pixel_count() as usize;
        match desc.channels {
            Channels::Rgb => {
                encode_chunk_lut::<3>(self, pixels, &mut bytes, &mut p, pixel_cnt, &mut state)
            }
            Channels::Rgba => {
                encode_chunk_lut::<4>(self, pixels, &mut bytes, &mut p, pixel_cnt, &mut state)
            }
        }
        state.finish(&mut bytes, &mut p);

        bytes.truncate(p);
        Ok(bytes)
    }
}

/// The scalar kernel with the op selection swapped for a table copy.
fn encode_chunk_lut<const CH: usize>(
    lut: &EncodeLut,
    pixels: &[u8],
    bytes: &mut [u8],
    p: &mut usize,
    pixel_cnt: usize,
    state: &mut RoiEncodeContext,
) {
    let mut cursor = *p;
    let mut run = state.run;
    let mut prev = state.prev;
    let px_end = (pixel_cnt - 1) * CH;

    let mut px_pos = 0;
    while px_pos <= px_end {
        let mut px = if CH == 4 {
            Pixel::read_rgba(pixels, px_pos)
        } else {
            Pixel::read_rgb(pixels, px_pos)
        };

        while px == prev {
            run += 1;
            if px_pos == px_end {
                while run >= 30 {
                    bytes[cursor] = crate::consts::ROI_OP_RUN30;
                    cursor += 1;
                    run -= 30;
                }
                state.prev = prev;
                state.run = run;
                *p = cursor;
                return;
            }
            px_pos += CH;
            px = if CH == 4 {
                Pixel::read_rgba(pixels, px_pos)
            } else {
                Pixel::read_rgb(pixels, px_pos)
            };
        }

        dump_run(bytes, &mut cursor, &mut run);
        if CH == 4 && px.a != prev.a {
            bytes[cursor] = ROI_OP_RGBA;
            bytes[cursor + 1] = px.a;
            cursor += 2;
        }

        let vr = px.r.wrapping_sub(prev.r) as i8;
        let vg = px.g.wrapping_sub(prev.g) as i8;
        let vb = px.b.wrapping_sub(prev.b) as i8;
        let entry = lut.entry(vg, vr.wrapping_sub(vg), vb.wrapping_sub(vg));
        let len = entry[0] as usize;
        bytes[cursor..cursor + len].copy_from_slice(&entry[1..1 + len]);
        cursor += len;

        prev = px;
        px_pos += CH;
    }

    state.prev = prev;
    state.run = run;
    *p = cursor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Codepath, Colorspace};

    #[test]
    fn table_entries_match_direct_emission() {
        let lut = EncodeLut::build();
        // a spread of triples across all four op classes
        for &(vg, vg_r, vg_b) in &[
            (0i8, 0i8, 0i8),
            (3, 1, -2),
            (-4, 1, 1),
            (31, 7, -8),
            (-32, -8, 7),
            (63, -64, 63),
            (-64, 63, -64),
            (64, 0, 0),
            (-128, 127, -128),
        ] {
            let mut direct = [0u8; 5];
            let mut len = 1;
            emit_diff_op(&mut direct[..], &mut len, vg, vg_r, vg_b);
            direct[0] = (len - 1) as u8;
            assert_eq!(lut.entry(vg, vg_r, vg_b), &direct, "({vg}, {vg_r}, {vg_b})");
        }
    }

    #[test]
    fn lut_encode_matches_scalar() {
        let lut = EncodeLut::build();
        let desc = Descriptor {
            width: 64,
            height: 3,
            channels: Channels::Rgb,
            colorspace: Colorspace::Srgb,
        };
        let mut pixels = alloc::vec![0u8; 64 * 3 * 3];
        for (i, b) in pixels.iter_mut().enumerate() {
            *b = ((i * 31) ^ (i >> 3)) as u8;
        }
        let scalar =
            RoiEncodeContext::encode_to_vec(&pixels, &desc, Codepath::Scalar).unwrap();
        let via_lut = lut.encode_to_vec(&pixels, &desc).unwrap();
        assert_eq!(scalar, via_lut);
    }
}
