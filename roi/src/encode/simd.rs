//! SSE encoder kernels: 16 pixels per iteration, four 32-bit-slot output
//! vectors, branchless compaction through a shuffle table.
//!
//! Both kernels promise byte-for-byte equivalence with the scalar kernel.
//! Two situations break the branchless flow and hand a whole 16-pixel group
//! to the scalar kernel instead: an alpha change anywhere in the group
//! (4-channel only), and any single zero-diff lane. The latter matters for
//! correctness, not just speed: a zero diff is a run contribution, and
//! letting it through payload packing would emit a LUMA232 byte where the
//! scalar kernel would have counted a run.

use super::{dump_run, encode_chunk_scalar, RoiEncodeContext};
use crate::utils::Pixel;
use core::arch::x86_64::*;

cpufeatures::new!(cpuid_simd, "ssse3", "sse4.1");

pub(crate) fn encode_chunk_simd3(
    pixels: &[u8],
    bytes: &mut [u8],
    p: &mut usize,
    pixel_cnt: usize,
    state: &mut RoiEncodeContext,
) {
    if cpuid_simd::get() {
        unsafe { encode_chunk3_sse(pixels, bytes, p, pixel_cnt, state) }
    } else {
        encode_chunk_scalar::<3>(pixels, bytes, p, pixel_cnt, state)
    }
}

pub(crate) fn encode_chunk_simd4(
    pixels: &[u8],
    bytes: &mut [u8],
    p: &mut usize,
    pixel_cnt: usize,
    state: &mut RoiEncodeContext,
) {
    if cpuid_simd::get() {
        unsafe { encode_chunk4_sse(pixels, bytes, p, pixel_cnt, state) }
    } else {
        encode_chunk_scalar::<4>(pixels, bytes, p, pixel_cnt, state)
    }
}

/// Byte length written per 4-pixel output vector, indexed by the packed
/// 2-bits-per-pixel op sizes (00 = 1-byte op .. 11 = 4-byte op).
static WRITER_LEN: [u8; 256] = writer_len_table();

/// Shuffle masks gathering the live bytes of four 4-byte pixel slots to the
/// low end of the vector. Companion of [`WRITER_LEN`].
static WRITER_LUT: [[u8; 16]; 256] = writer_shuffle_table();

const fn writer_len_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut idx = 0;
    while idx < 256 {
        let mut len = 0u8;
        let mut px = 0;
        while px < 4 {
            len += ((idx >> (2 * px)) & 3) as u8 + 1;
            px += 1;
        }
        table[idx] = len;
        idx += 1;
    }
    table
}

const fn writer_shuffle_table() -> [[u8; 16]; 256] {
    let mut table = [[0u8; 16]; 256];
    let mut idx = 0;
    while idx < 256 {
        let mut entry = [0u8; 16];
        let mut written = 0;
        let mut px = 0;
        while px < 4 {
            let len = ((idx >> (2 * px)) & 3) + 1;
            let mut byte = 0;
            while byte < len {
                entry[written] = (px * 4 + byte) as u8;
                written += 1;
                byte += 1;
            }
            px += 1;
        }
        table[idx] = entry;
        idx += 1;
    }
    table
}

/// Load 16 input bytes and diff them against the same channel one pixel
/// earlier: the previous pixel's trailing bytes are carried in from `prev`,
/// the rest comes from this load shifted by one pixel.
///
/// `LSHIFT` is the pixel size in bytes, `RSHIFT` is `16 - LSHIFT`.
///
/// # Safety
///
/// `ptr` must be valid for a 16-byte read; caller must have SSSE3/SSE4.1.
#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn load_diff<const LSHIFT: i32, const RSHIFT: i32>(
    ptr: *const u8,
    prev: __m128i,
) -> (__m128i, __m128i) {
    let raw = _mm_loadu_si128(ptr as *const __m128i);
    let shifted = _mm_or_si128(_mm_slli_si128::<LSHIFT>(raw), _mm_srli_si128::<RSHIFT>(prev));
    (raw, _mm_sub_epi8(raw, shifted))
}

/// Per-lane `(v < 0) ? -v - 1 : v`.
#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn folded_abs_epi8(plane: __m128i) -> __m128i {
    let neg = _mm_cmpgt_epi8(_mm_setzero_si128(), plane);
    let folded = _mm_abs_epi8(_mm_add_epi8(_mm_and_si128(neg, plane), _mm_set1_epi8(1)));
    _mm_blendv_epi8(plane, folded, neg)
}

/// Bias the plane, mask it to the op's lanes, widen bytes to 32-bit pixel
/// slots and OR it in at bit position `SHIFT` (shift applied at 16-bit
/// width, for positions below bit 16).
#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn spread16<const SHIFT: i32>(
    res: &mut [__m128i; 4],
    plane: __m128i,
    opmask: __m128i,
    bias: i8,
) {
    let zero = _mm_setzero_si128();
    let biased = _mm_and_si128(_mm_add_epi8(plane, _mm_set1_epi8(bias)), opmask);
    let lo = _mm_slli_epi16::<SHIFT>(_mm_unpacklo_epi8(biased, zero));
    res[0] = _mm_or_si128(_mm_unpacklo_epi16(lo, zero), res[0]);
    res[1] = _mm_or_si128(_mm_unpackhi_epi16(lo, zero), res[1]);
    let hi = _mm_slli_epi16::<SHIFT>(_mm_unpackhi_epi8(biased, zero));
    res[2] = _mm_or_si128(_mm_unpacklo_epi16(hi, zero), res[2]);
    res[3] = _mm_or_si128(_mm_unpackhi_epi16(hi, zero), res[3]);
}

/// As [`spread16`], but the shift happens at 32-bit width for payload
/// positions at bit 16 and above (the LUMA777 red/blue fields).
#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn spread32<const SHIFT: i32>(
    res: &mut [__m128i; 4],
    plane: __m128i,
    opmask: __m128i,
    bias: i8,
) {
    let zero = _mm_setzero_si128();
    let biased = _mm_and_si128(_mm_add_epi8(plane, _mm_set1_epi8(bias)), opmask);
    let lo = _mm_unpacklo_epi8(biased, zero);
    res[0] = _mm_or_si128(_mm_slli_epi32::<SHIFT>(_mm_unpacklo_epi16(lo, zero)), res[0]);
    res[1] = _mm_or_si128(_mm_slli_epi32::<SHIFT>(_mm_unpackhi_epi16(lo, zero)), res[1]);
    let hi = _mm_unpackhi_epi8(biased, zero);
    res[2] = _mm_or_si128(_mm_slli_epi32::<SHIFT>(_mm_unpacklo_epi16(hi, zero)), res[2]);
    res[3] = _mm_or_si128(_mm_slli_epi32::<SHIFT>(_mm_unpackhi_epi16(hi, zero)), res[3]);
}

/// Place the unbiased `vg`, `vg_r`, `vg_b` of RGB-op lanes at byte offsets
/// 1, 2 and 3 of their pixel slots (the 0xF7 tag is placed with the other
/// tags from the opcode vector).
#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn spread_rgb_payload(
    res: &mut [__m128i; 4],
    g: __m128i,
    r: __m128i,
    b: __m128i,
    op4: __m128i,
) {
    let zero = _mm_setzero_si128();

    // green to byte 1: unpack with zeros on the low side
    let masked = _mm_and_si128(g, op4);
    let lo = _mm_unpacklo_epi8(zero, masked);
    res[0] = _mm_or_si128(_mm_unpacklo_epi16(lo, zero), res[0]);
    res[1] = _mm_or_si128(_mm_unpackhi_epi16(lo, zero), res[1]);
    let hi = _mm_unpackhi_epi8(zero, masked);
    res[2] = _mm_or_si128(_mm_unpacklo_epi16(hi, zero), res[2]);
    res[3] = _mm_or_si128(_mm_unpackhi_epi16(hi, zero), res[3]);

    // vg_r to byte 2
    let masked = _mm_and_si128(r, op4);
    let lo = _mm_unpacklo_epi8(masked, zero);
    res[0] = _mm_or_si128(_mm_unpacklo_epi16(zero, lo), res[0]);
    res[1] = _mm_or_si128(_mm_unpackhi_epi16(zero, lo), res[1]);
    let hi = _mm_unpackhi_epi8(masked, zero);
    res[2] = _mm_or_si128(_mm_unpacklo_epi16(zero, hi), res[2]);
    res[3] = _mm_or_si128(_mm_unpackhi_epi16(zero, hi), res[3]);

    // vg_b to byte 3
    let masked = _mm_and_si128(b, op4);
    let lo = _mm_unpacklo_epi8(zero, masked);
    res[0] = _mm_or_si128(_mm_unpacklo_epi16(zero, lo), res[0]);
    res[1] = _mm_or_si128(_mm_unpackhi_epi16(zero, lo), res[1]);
    let hi = _mm_unpackhi_epi8(zero, masked);
    res[2] = _mm_or_si128(_mm_unpacklo_epi16(zero, hi), res[2]);
    res[3] = _mm_or_si128(_mm_unpackhi_epi16(zero, hi), res[3]);
}

/// Two bits per pixel (op byte length minus one) for the low 8 lanes,
/// packed by `movemask`: bit `2i` from op2|op4, bit `2i+1` from op3|op4.
#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn lut_index_lo(op2: __m128i, op3: __m128i, op4: __m128i) -> usize {
    let zero = _mm_setzero_si128();
    let mut bits = _mm_unpacklo_epi8(op2, zero);
    bits = _mm_or_si128(bits, _mm_unpacklo_epi8(zero, op3));
    bits = _mm_or_si128(bits, _mm_unpacklo_epi8(op4, op4));
    _mm_movemask_epi8(bits) as usize
}

#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn lut_index_hi(op2: __m128i, op3: __m128i, op4: __m128i) -> usize {
    let zero = _mm_setzero_si128();
    let mut bits = _mm_unpackhi_epi8(op2, zero);
    bits = _mm_or_si128(bits, _mm_unpackhi_epi8(zero, op3));
    bits = _mm_or_si128(bits, _mm_unpackhi_epi8(op4, op4));
    _mm_movemask_epi8(bits) as usize
}

/// Compact one output vector's live bytes to the left and store it.
///
/// Always stores 16 bytes and advances the cursor by the live length, so
/// the output buffer needs 15 bytes of slack past the worst case.
#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn write_vec(bytes: &mut [u8], p: &mut usize, res: __m128i, lut_idx: usize) {
    debug_assert!(*p + 16 <= bytes.len());
    let shuffle = _mm_loadu_si128(WRITER_LUT[lut_idx].as_ptr() as *const __m128i);
    let compacted = _mm_shuffle_epi8(res, shuffle);
    _mm_storeu_si128(bytes.as_mut_ptr().add(*p) as *mut __m128i, compacted);
    *p += WRITER_LEN[lut_idx] as usize;
}

/// Classify 16 lanes of planar diffs, pack payloads and store the four
/// output vectors. All lanes must be non-zero diffs and any pending run
/// must already be flushed.
#[inline]
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn sse_encode_rgb16(
    vr: __m128i,
    vg: __m128i,
    vb: __m128i,
    bytes: &mut [u8],
    p: &mut usize,
) {
    let zero = _mm_setzero_si128();

    // convert vr, vb to vg_r, vg_b
    let r = _mm_sub_epi8(vr, vg);
    let b = _mm_sub_epi8(vb, vg);
    let g = vg;

    let ar = folded_abs_epi8(r);
    let ag = folded_abs_epi8(g);
    let ab = folded_abs_epi8(b);
    let arb = _mm_or_si128(ar, ab);

    // cumulative range masks, then peel to exact per-op masks
    let op1 = _mm_cmpgt_epi8(
        _mm_set1_epi8(2),
        _mm_or_si128(_mm_subs_epu8(ag, _mm_set1_epi8(2)), arb),
    );
    let op2_cum = _mm_cmpgt_epi8(
        _mm_set1_epi8(8),
        _mm_or_si128(_mm_subs_epu8(ag, _mm_set1_epi8(24)), arb),
    );
    let op3_cum = _mm_cmpgt_epi8(_mm_set1_epi8(64), _mm_or_si128(arb, ag));
    let op4 = _mm_andnot_si128(op3_cum, _mm_set1_epi8(-1));
    let op3 = _mm_sub_epi8(op3_cum, op2_cum);
    let op2 = _mm_sub_epi8(op2_cum, op1);

    let mut res = [zero; 4];

    // tag byte per lane: LUMA232 contributes 0, LUMA464 bit 0, LUMA777
    // bits 0-1, RGB the full 0xF7
    let mut opuse = _mm_and_si128(op2, _mm_set1_epi8(1));
    opuse = _mm_or_si128(opuse, _mm_and_si128(op3, _mm_set1_epi8(3)));
    opuse = _mm_or_si128(opuse, _mm_and_si128(op4, _mm_set1_epi8(-9)));
    let lo = _mm_unpacklo_epi8(opuse, zero);
    res[0] = _mm_or_si128(_mm_unpacklo_epi16(lo, zero), res[0]);
    res[1] = _mm_or_si128(_mm_unpackhi_epi16(lo, zero), res[1]);
    let hi = _mm_unpackhi_epi8(opuse, zero);
    res[2] = _mm_or_si128(_mm_unpacklo_epi16(hi, zero), res[2]);
    res[3] = _mm_or_si128(_mm_unpackhi_epi16(hi, zero), res[3]);

    // bbrrggg0
    spread16::<1>(&mut res, g, op1, 4);
    spread16::<4>(&mut res, r, op1, 2);
    spread16::<6>(&mut res, b, op1, 2);
    // bbbbrrrr gggggg01
    spread16::<2>(&mut res, g, op2, 32);
    spread16::<8>(&mut res, r, op2, 8);
    spread16::<12>(&mut res, b, op2, 8);
    // bbbbbbbr rrrrrrgg ggggg011
    spread16::<3>(&mut res, g, op3, 64);
    spread32::<10>(&mut res, r, op3, 64);
    spread32::<17>(&mut res, b, op3, 64);
    // 11110111 gggggggg rrrrrrrr bbbbbbbb
    spread_rgb_payload(&mut res, g, r, b, op4);

    let idx = lut_index_lo(op2, op3, op4);
    write_vec(bytes, p, res[0], idx & 255);
    write_vec(bytes, p, res[1], (idx >> 8) & 255);
    let idx = lut_index_hi(op2, op3, op4);
    write_vec(bytes, p, res[2], idx & 255);
    write_vec(bytes, p, res[3], (idx >> 8) & 255);
}

/// # Safety
///
/// Caller must have verified SSSE3 + SSE4.1. `pixel_cnt` must be a multiple
/// of 16, `pixels` must hold `pixel_cnt * 3` bytes, and `bytes` must have
/// worst-case room (4 bytes per pixel) plus 15 bytes of store slack past
/// the cursor.
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn encode_chunk3_sse(
    pixels: &[u8],
    bytes: &mut [u8],
    p: &mut usize,
    pixel_cnt: usize,
    state: &mut RoiEncodeContext,
) {
    debug_assert!(pixel_cnt % 16 == 0);
    debug_assert!(pixels.len() >= pixel_cnt * 3);

    let rshuf = _mm_setr_epi8(0, 3, 6, 9, 12, 15, 2, 5, 8, 11, 14, 1, 4, 7, 10, 13);
    let gshuf = _mm_setr_epi8(1, 4, 7, 10, 13, 0, 3, 6, 9, 12, 15, 2, 5, 8, 11, 14);
    let bshuf = _mm_setr_epi8(2, 5, 8, 11, 14, 1, 4, 7, 10, 13, 0, 3, 6, 9, 12, 15);
    let blend1 = _mm_setr_epi8(0, 0, -1, 0, 0, -1, 0, 0, -1, 0, 0, -1, 0, 0, -1, 0);
    let blend2 = _mm_setr_epi8(0, -1, 0, 0, -1, 0, 0, -1, 0, 0, -1, 0, 0, -1, 0, 0);

    let mut cursor = *p;
    let mut run = state.run;

    // previous pixel rides in the top three lanes
    let prev = state.prev;
    let mut carry = _mm_setr_epi8(
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, prev.r as i8, prev.g as i8, prev.b as i8,
    );

    let mut px_pos = 0;
    while px_pos < pixel_cnt * 3 {
        let previous = carry;
        let (aa, da) = load_diff::<3, 13>(pixels.as_ptr().add(px_pos), carry);
        let (bb, db) = load_diff::<3, 13>(pixels.as_ptr().add(px_pos + 16), aa);
        let (cc, dc) = load_diff::<3, 13>(pixels.as_ptr().add(px_pos + 32), bb);
        carry = cc;

        if _mm_test_all_zeros(_mm_or_si128(da, _mm_or_si128(db, dc)), _mm_set1_epi8(-1)) != 0 {
            // all 16 diffs zero
            run += 16;
            px_pos += 48;
            continue;
        }

        // interleaved diffs to planar r/g/b
        let r = _mm_shuffle_epi8(
            _mm_blendv_epi8(_mm_blendv_epi8(da, db, blend1), dc, blend2),
            rshuf,
        );
        let g = _mm_shuffle_epi8(
            _mm_blendv_epi8(_mm_blendv_epi8(db, dc, blend1), da, blend2),
            gshuf,
        );
        let b = _mm_shuffle_epi8(
            _mm_blendv_epi8(_mm_blendv_epi8(dc, da, blend1), db, blend2),
            bshuf,
        );

        let zero_lane =
            _mm_cmpeq_epi8(_mm_or_si128(r, _mm_or_si128(g, b)), _mm_setzero_si128());
        if _mm_testz_si128(zero_lane, zero_lane) == 0 {
            // a zero-diff lane is a run contribution, take the group scalar
            let mut dump = [0u8; 16];
            _mm_storeu_si128(dump.as_mut_ptr() as *mut __m128i, previous);
            state.prev = Pixel {
                r: dump[13],
                g: dump[14],
                b: dump[15],
                a: 255,
            };
            state.run = run;
            encode_chunk_scalar::<3>(
                &pixels[px_pos..px_pos + 48],
                bytes,
                &mut cursor,
                16,
                state,
            );
            run = state.run;
            px_pos += 48;
            continue;
        }

        dump_run(bytes, &mut cursor, &mut run);
        sse_encode_rgb16(r, g, b, bytes, &mut cursor);
        px_pos += 48;
    }

    let mut dump = [0u8; 16];
    _mm_storeu_si128(dump.as_mut_ptr() as *mut __m128i, carry);
    state.prev = Pixel {
        r: dump[13],
        g: dump[14],
        b: dump[15],
        a: 255,
    };
    state.run = run;
    *p = cursor;
}

/// # Safety
///
/// As [`encode_chunk3_sse`], with `pixels` holding `pixel_cnt * 4` bytes
/// and worst-case output room of 6 bytes per pixel.
#[target_feature(enable = "ssse3,sse4.1")]
unsafe fn encode_chunk4_sse(
    pixels: &[u8],
    bytes: &mut [u8],
    p: &mut usize,
    pixel_cnt: usize,
    state: &mut RoiEncodeContext,
) {
    debug_assert!(pixel_cnt % 16 == 0);
    debug_assert!(pixels.len() >= pixel_cnt * 4);

    let shuf1 = _mm_setr_epi8(0, 4, 8, 12, 1, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15);
    let shuf2 = _mm_setr_epi8(1, 5, 9, 13, 0, 4, 8, 12, 3, 7, 11, 15, 2, 6, 10, 14);
    let gshuf = _mm_setr_epi8(8, 9, 10, 11, 12, 13, 14, 15, 0, 1, 2, 3, 4, 5, 6, 7);
    let blend = _mm_setr_epi8(0, 0, 0, 0, 0, 0, 0, 0, -1, -1, -1, -1, -1, -1, -1, -1);

    let mut cursor = *p;
    let mut run = state.run;

    let prev = state.prev;
    let mut carry = _mm_setr_epi8(
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        0,
        prev.r as i8,
        prev.g as i8,
        prev.b as i8,
        prev.a as i8,
    );

    let mut px_pos = 0;
    while px_pos < pixel_cnt * 4 {
        let previous = carry;
        let (ia, da) = load_diff::<4, 12>(pixels.as_ptr().add(px_pos), carry);
        let (ib, db) = load_diff::<4, 12>(pixels.as_ptr().add(px_pos + 16), ia);
        let (ic, dc) = load_diff::<4, 12>(pixels.as_ptr().add(px_pos + 32), ib);
        let (id, dd) = load_diff::<4, 12>(pixels.as_ptr().add(px_pos + 48), ic);
        carry = id;

        if _mm_test_all_zeros(
            _mm_or_si128(_mm_or_si128(da, db), _mm_or_si128(dc, dd)),
            _mm_set1_epi8(-1),
        ) != 0
        {
            run += 16;
            px_pos += 64;
            continue;
        }

        // unpack into rgba planes
        let w1 = _mm_shuffle_epi8(da, shuf1); // r4 g4 b4 a4
        let w2 = _mm_shuffle_epi8(db, shuf1);
        let w3 = _mm_shuffle_epi8(dc, shuf2); // g4 r4 a4 b4
        let w4 = _mm_shuffle_epi8(dd, shuf2);
        let w5 = _mm_unpackhi_epi32(w1, w2); // b8 a8
        let w6 = _mm_unpackhi_epi32(w3, w4); // a8 b8

        let a = _mm_blendv_epi8(w6, w5, blend); // lane order scrambled, only tested for zero
        if _mm_test_all_zeros(a, _mm_set1_epi8(-1)) == 0 {
            // alpha changed somewhere in the group; interleaving the alpha
            // op with packed RGB ops is the scalar kernel's job
            let mut dump = [0u8; 16];
            _mm_storeu_si128(dump.as_mut_ptr() as *mut __m128i, previous);
            state.prev = Pixel {
                r: dump[12],
                g: dump[13],
                b: dump[14],
                a: dump[15],
            };
            state.run = run;
            encode_chunk_scalar::<4>(
                &pixels[px_pos..px_pos + 64],
                bytes,
                &mut cursor,
                16,
                state,
            );
            run = state.run;
            px_pos += 64;
            continue;
        }

        let b = _mm_blendv_epi8(w5, w6, blend);
        let w1 = _mm_unpacklo_epi32(w1, w2); // r8 g8
        let w2 = _mm_unpacklo_epi32(w3, w4); // g8 r8
        let r = _mm_blendv_epi8(w1, w2, blend);
        let g = _mm_shuffle_epi8(_mm_blendv_epi8(w2, w1, blend), gshuf);

        let zero_lane =
            _mm_cmpeq_epi8(_mm_or_si128(r, _mm_or_si128(g, b)), _mm_setzero_si128());
        if _mm_testz_si128(zero_lane, zero_lane) == 0 {
            let mut dump = [0u8; 16];
            _mm_storeu_si128(dump.as_mut_ptr() as *mut __m128i, previous);
            state.prev = Pixel {
                r: dump[12],
                g: dump[13],
                b: dump[14],
                a: dump[15],
            };
            state.run = run;
            encode_chunk_scalar::<4>(
                &pixels[px_pos..px_pos + 64],
                bytes,
                &mut cursor,
                16,
                state,
            );
            run = state.run;
            px_pos += 64;
            continue;
        }

        dump_run(bytes, &mut cursor, &mut run);
        sse_encode_rgb16(r, g, b, bytes, &mut cursor);
        px_pos += 64;
    }

    let mut dump = [0u8; 16];
    _mm_storeu_si128(dump.as_mut_ptr() as *mut __m128i, carry);
    state.prev = Pixel {
        r: dump[12],
        g: dump[13],
        b: dump[14],
        a: dump[15],
    };
    state.run = run;
    *p = cursor;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_tables_agree() {
        for idx in 0..256 {
            let mut expected = 0;
            for px in 0..4 {
                expected += ((idx >> (2 * px)) & 3) + 1;
            }
            assert_eq!(WRITER_LEN[idx] as usize, expected);

            // the shuffle must list exactly the live bytes, in order
            let entry = &WRITER_LUT[idx];
            let mut want = alloc::vec::Vec::new();
            for px in 0..4 {
                let len = ((idx >> (2 * px)) & 3) + 1;
                for byte in 0..len {
                    want.push((px * 4 + byte) as u8);
                }
            }
            assert_eq!(&entry[..want.len()], &want[..]);
        }
    }

    #[test]
    fn writer_lut_matches_known_entries() {
        // spot checks against the reference tables
        assert_eq!(&WRITER_LUT[0][..4], &[0, 4, 8, 12]);
        assert_eq!(&WRITER_LUT[1][..5], &[0, 1, 4, 8, 12]);
        assert_eq!(&WRITER_LUT[4][..5], &[0, 4, 5, 8, 12]);
        assert_eq!(&WRITER_LUT[255][..16], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
        assert_eq!(WRITER_LEN[0], 4);
        assert_eq!(WRITER_LEN[255], 16);
    }

    fn lcg_pixels(len: usize, seed: &mut u32, spread: u8) -> alloc::vec::Vec<u8> {
        // xorshift noise, optionally confined near the previous byte so all
        // four op classes come up
        let mut out = alloc::vec![0u8; len];
        let mut last = 0u8;
        for byte in out.iter_mut() {
            *seed ^= *seed << 13;
            *seed ^= *seed >> 17;
            *seed ^= *seed << 5;
            last = if spread == 255 {
                (*seed >> 24) as u8
            } else {
                last.wrapping_add(((*seed >> 24) as u8) % (2 * spread + 1)).wrapping_sub(spread)
            };
            *byte = last;
        }
        out
    }

    fn compare_paths<const CH: usize>(pixels: &[u8]) {
        let pixel_cnt = pixels.len() / CH;
        let cap = pixel_cnt * 6 + 64;

        let mut scalar_out = alloc::vec![0u8; cap];
        let mut scalar_p = 0;
        let mut scalar_state = RoiEncodeContext::new();
        encode_chunk_scalar::<CH>(
            pixels,
            &mut scalar_out,
            &mut scalar_p,
            pixel_cnt,
            &mut scalar_state,
        );

        let mut simd_out = alloc::vec![0u8; cap];
        let mut simd_p = 0;
        let mut simd_state = RoiEncodeContext::new();
        if CH == 3 {
            encode_chunk_simd3(pixels, &mut simd_out, &mut simd_p, pixel_cnt, &mut simd_state);
        } else {
            encode_chunk_simd4(pixels, &mut simd_out, &mut simd_p, pixel_cnt, &mut simd_state);
        }

        assert_eq!(scalar_p, simd_p);
        assert_eq!(&scalar_out[..scalar_p], &simd_out[..simd_p]);
        assert_eq!(scalar_state.prev, simd_state.prev);
        assert_eq!(scalar_state.run, simd_state.run);
    }

    #[test]
    fn sse_matches_scalar_rgb() {
        let mut seed = 0x2545_F491;
        for &spread in &[1u8, 3, 9, 70, 255] {
            compare_paths::<3>(&lcg_pixels(256 * 3, &mut seed, spread));
        }
    }

    #[test]
    fn sse_matches_scalar_rgba() {
        let mut seed = 0x9E37_79B9;
        for &spread in &[1u8, 3, 9, 70, 255] {
            compare_paths::<4>(&lcg_pixels(256 * 4, &mut seed, spread));
        }
    }

    #[test]
    fn sse_matches_scalar_with_runs() {
        // blocks of constant pixels interleaved with noise hit the RLE fast
        // path, the partial-run fallback and the packed path
        let mut seed = 0xDEAD_BEEF;
        let mut pixels = alloc::vec::Vec::new();
        for block in 0..32 {
            if block % 2 == 0 {
                let px = [(block * 7) as u8, (block * 11) as u8, (block * 13) as u8];
                for _ in 0..24 {
                    pixels.extend_from_slice(&px);
                }
            } else {
                pixels.extend_from_slice(&lcg_pixels(24 * 3, &mut seed, 5));
            }
        }
        // trim to a multiple of 16 pixels
        let pixel_cnt = (pixels.len() / 3) & !15;
        pixels.truncate(pixel_cnt * 3);
        compare_paths::<3>(&pixels);
    }

    #[test]
    fn sse_matches_scalar_with_alpha_changes() {
        let mut seed = 0x0BAD_F00D;
        let mut pixels = lcg_pixels(256 * 4, &mut seed, 4);
        // flip alpha inside a couple of 16-pixel groups
        pixels[3] = 200;
        pixels[64 * 4 + 3] = 17;
        for px in 128..144 {
            pixels[px * 4 + 3] = 9;
        }
        compare_paths::<4>(&pixels);
    }
}
