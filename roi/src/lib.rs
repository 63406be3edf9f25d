//! Reference implementation for the ROI image format.
//!
//! ROI is heavily based on the [QOI image format](https://qoiformat.org/), but
//! drops the colour array, moves the opcode tags into the *low* bits of each
//! chunk and stores all multi-byte payloads little-endian. Tag-in-low-bits plus
//! little-endian payloads is what makes the vectorised encoder possible: a
//! whole opcode can be built as one integer and written with a single
//! unaligned store.
//!
//! # Differences from QOI
//!
//! ## Header
//!
//! Identical layout, different magic: `roif`, u32be width, u32be height, one
//! byte each for channels (3 or 4) and colorspace.
//!
//! ## Opcodes
//!
//! There is no index/colour-array op. Every pixel is either a run of the
//! previous pixel or a difference from it, stored in 1 to 4 bytes for RGB and
//! up to 6 bytes when alpha changes. The red and blue diffs are stored
//! relative to the green diff ("luma" style) at three precisions, see
//! [`consts`].
//!
//! ## Encoder paths
//!
//! The stream is defined byte-by-byte, so the scalar kernel, the 128-bit SIMD
//! kernel ([`Codepath::Simd`]) and the table-driven kernel
//! ([`encode::EncodeLut`]) all produce identical output for identical input,
//! on every host.
//!
//! # Stream format
//!
//! A ROI file is a 14-byte header, any number of opcodes, and the 8-byte end
//! marker `00 00 00 00 00 00 00 01`. The decoder and encoder start with
//! `{r: 0, g: 0, b: 0, a: 255}` as the previous pixel value. An image is
//! complete when `width * height` pixels have been covered. Alpha is
//! un-premultiplied. See [`consts`] for the individual operations.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod decode;
pub mod encode;
pub mod utils;

pub use decode::RoiDecodeContext;
pub use encode::RoiEncodeContext;

/// Magic bytes at offset 0 of every stream.
pub const MAGIC: [u8; 4] = *b"roif";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 14;

/// The 8-byte end marker terminating every stream.
pub const PADDING: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 1];

/// Upper bound on `width * height`.
///
/// 400 million pixels keeps the worst-case encoded size comfortably under
/// 2 GiB at 5 bytes per pixel.
pub const PIXELS_MAX: u64 = 400_000_000;

pub mod consts {
    //! The six stream operations, discriminated by a variable-length tag in
    //! the *low* bits of the first byte. An 0xF7/0xFF first byte must be
    //! checked before the `xxxxx111` run tag.
    //!
    //! Throughout: `vr`, `vg`, `vb` are the red/green/blue differences from
    //! the previous pixel (wraparound byte subtraction), and
    //! `vg_r = vr - vg`, `vg_b = vb - vg`. Biased values are stored as
    //! unsigned, e.g. a diff in -4..=3 is stored as 0..=7 by adding 4.

    /// Green diff and luma-relative red/blue diffs in one byte.
    ///
    /// ```plain
    /// .- ROI_OP_LUMA232 --------.
    /// |         Byte[0]         |
    /// |  7  6  5  4  3  2  1  0 |
    /// |-------+-------+------+--|
    /// | db-dg | dr-dg |  dg  | 0|
    /// `-------------------------`
    /// ```
    ///
    /// - 1-bit tag b0
    /// - 3-bit green channel difference from the previous pixel -4..=3,
    ///   stored with a bias of 4
    /// - 2-bit red channel difference minus green channel difference
    ///   -2..=1, stored with a bias of 2
    /// - 2-bit blue channel difference minus green channel difference
    ///   -2..=1, stored with a bias of 2
    pub const ROI_OP_LUMA232: u8 = 0x00;

    /// Two-byte luma op, payload little-endian.
    ///
    /// ```plain
    /// .- ROI_OP_LUMA464 ----------------------------------.
    /// |         Byte[0]         |         Byte[1]         |
    /// |  7  6  5  4  3  2  1  0 |  7  6  5  4  3  2  1  0 |
    /// |-------------------+-----+------------+------------|
    /// |        dg         | 0 1 |   db-dg    |   dr-dg    |
    /// `---------------------------------------------------`
    /// ```
    ///
    /// - 2-bit tag b01
    /// - 6-bit green channel difference -32..=31, bias 32
    /// - 4-bit `dr - dg` -8..=7, bias 8
    /// - 4-bit `db - dg` -8..=7, bias 8
    pub const ROI_OP_LUMA464: u8 = 0x01;

    /// Three-byte luma op `ggggg011 rrrrrrgg bbbbbbbr`, payload
    /// little-endian: the biased values sit at bit offsets 3 (dg),
    /// 10 (dr-dg) and 17 (db-dg) of the 24-bit chunk.
    ///
    /// - 3-bit tag b011
    /// - 7-bit green channel difference -64..=63, bias 64
    /// - 7-bit `dr - dg` -64..=63, bias 64
    /// - 7-bit `db - dg` -64..=63, bias 64
    pub const ROI_OP_LUMA777: u8 = 0x03;

    /// Run of the previous pixel.
    ///
    /// ```plain
    /// .- ROI_OP_RUN ------------.
    /// |         Byte[0]         |
    /// |  7  6  5  4  3  2  1  0 |
    /// |----------------+--------|
    /// |      run       | 1 1 1  |
    /// `-------------------------`
    /// ```
    ///
    /// - 3-bit tag b111
    /// - 5-bit run length, x = 0..=29 encoding runs of 1..=30
    ///
    /// x = 30 and x = 31 are reserved: those bit patterns are
    /// [`ROI_OP_RGB`] and [`ROI_OP_RGBA`]. Longer runs chain
    /// [`ROI_OP_RUN30`] bytes.
    pub const ROI_OP_RUN: u8 = 0x07;

    /// The saturated run byte (x = 29, run of 30): `11101111`.
    pub const ROI_OP_RUN30: u8 = 0xEF;

    /// Four-byte op storing the unbiased diffs `vg`, `vg_r`, `vg_b` as raw
    /// signed bytes after the `11110111` tag.
    pub const ROI_OP_RGB: u8 = 0xF7;

    /// `11111111` followed by the new alpha value. Only describes alpha;
    /// always followed by one of the RGB-family ops for the same pixel.
    pub const ROI_OP_RGBA: u8 = 0xFF;

    /// Mask for the 1-bit [`ROI_OP_LUMA232`] tag.
    pub const ROI_MASK_1: u8 = 0x01;
    /// Mask for the 2-bit [`ROI_OP_LUMA464`] tag.
    pub const ROI_MASK_2: u8 = 0x03;
    /// Mask for the 3-bit [`ROI_OP_LUMA777`] / [`ROI_OP_RUN`] tags.
    pub const ROI_MASK_3: u8 = 0x07;
}

/// Number of channels in a pixel buffer. ROI only deals in 8-bit RGB and
/// RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channels {
    Rgb = 3,
    Rgba = 4,
}

impl Channels {
    /// Bytes per pixel.
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    pub const fn from_u8(n: u8) -> Option<Self> {
        match n {
            3 => Some(Channels::Rgb),
            4 => Some(Channels::Rgba),
            _ => None,
        }
    }
}

/// The colorspace byte of the header. Purely informative: it is stored in
/// the header but never affects how chunks are coded.
///
/// On decode, raw values 2 and 3 are tolerated for compatibility with
/// streams from a legacy encoder that used bit 1 as an "RLE disabled" flag;
/// they are reported as the corresponding 0/1 value. The encoder only
/// writes 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Colorspace {
    /// Gamma scaled RGB channels and a linear alpha channel.
    Srgb = 0,
    /// All channels linear.
    Linear = 1,
}

/// Which encoder kernel the driver runs over full pixel windows. Has no
/// effect on the produced bytes, only on how fast they are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codepath {
    #[default]
    Scalar,
    /// 128-bit SSE kernel, 16 pixels per iteration. Falls back to scalar at
    /// runtime on hosts without SSSE3 + SSE4.1 (and on non-x86-64 builds).
    Simd,
}

/// Image description handed to the encoder, or filled in from a stream
/// header by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
    pub colorspace: Colorspace,
}

impl Descriptor {
    /// Total number of pixels described.
    #[inline]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the dimensions are non-zero and under the [`PIXELS_MAX`]
    /// guard (`height < PIXELS_MAX / width`, integer division).
    #[inline]
    pub const fn dimensions_valid(&self) -> bool {
        self.width != 0 && self.height != 0 && (self.height as u64) < PIXELS_MAX / self.width as u64
    }

    /// Worst-case encoded size of an image with this description, including
    /// header and end marker.
    ///
    /// Worst case per pixel is 4 bytes for RGB input and 6 bytes for RGBA
    /// (2-byte alpha op followed by a 4-byte RGB op).
    #[inline]
    pub const fn max_encoded_size(&self) -> usize {
        let per_pixel = match self.channels {
            Channels::Rgb => 4,
            Channels::Rgba => 6,
        };
        self.pixel_count() as usize * per_pixel + HEADER_SIZE + PADDING.len()
    }
}
