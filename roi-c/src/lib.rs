use roi::{encode::RoiEncodeContext, Channels, Codepath, Colorspace, Descriptor};

/// Image description crossing the C boundary; layout matches the header
/// fields.
#[repr(C)]
pub struct RoiDescriptor {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub colorspace: u8,
}

impl RoiDescriptor {
    fn to_descriptor(&self) -> Option<Descriptor> {
        let channels = Channels::from_u8(self.channels)?;
        let colorspace = match self.colorspace {
            0 => Colorspace::Srgb,
            1 => Colorspace::Linear,
            _ => return None,
        };
        Some(Descriptor {
            width: self.width,
            height: self.height,
            channels,
            colorspace,
        })
    }

    fn fill_from(&mut self, desc: &Descriptor) {
        self.width = desc.width;
        self.height = desc.height;
        self.channels = desc.channels as u8;
        self.colorspace = desc.colorspace as u8;
    }
}

/// Worst-case encoded size for an image with the given description,
/// including header and end marker. Returns 0 for an invalid description.
///
/// # Safety
///
/// `desc` must point to a valid `RoiDescriptor`.
#[no_mangle]
pub unsafe extern "C" fn roi_max_encoded_size(desc: *const RoiDescriptor) -> usize {
    if desc.is_null() {
        return 0;
    }
    match (*desc).to_descriptor() {
        Some(d) if d.dimensions_valid() => d.max_encoded_size(),
        _ => 0,
    }
}

/// Encode raw pixels into a caller-allocated buffer of at least
/// `roi_max_encoded_size(desc)` bytes.
///
/// `use_simd` non-zero selects the vectorised kernel (identical output).
/// Returns the encoded length, or -1 on invalid parameters.
///
/// # Safety
///
/// - `pixels` must be valid for reads of `pixels_len` bytes
/// - `desc` must point to a valid `RoiDescriptor`
/// - `out` must be valid for writes of `out_len` bytes
#[no_mangle]
pub unsafe extern "C" fn roi_encode(
    pixels: *const u8,
    pixels_len: usize,
    desc: *const RoiDescriptor,
    use_simd: i32,
    out: *mut u8,
    out_len: usize,
) -> isize {
    if pixels.is_null() || desc.is_null() || out.is_null() {
        return -1;
    }
    let Some(d) = (*desc).to_descriptor() else {
        return -1;
    };
    let pixels = core::slice::from_raw_parts(pixels, pixels_len);
    let out = core::slice::from_raw_parts_mut(out, out_len);
    let codepath = if use_simd != 0 {
        Codepath::Simd
    } else {
        Codepath::Scalar
    };
    match RoiEncodeContext::encode_to_buf(pixels, &d, codepath, out) {
        Ok(len) => len as isize,
        Err(_) => -1,
    }
}

/// Parse and validate a stream header, filling `desc`.
///
/// Returns 0 on success, -1 on failure.
///
/// # Safety
///
/// - `data` must be valid for reads of `data_len` bytes
/// - `desc` must point to writable `RoiDescriptor` storage
#[no_mangle]
pub unsafe extern "C" fn roi_decode_header(
    data: *const u8,
    data_len: usize,
    desc: *mut RoiDescriptor,
) -> i32 {
    if data.is_null() || desc.is_null() {
        return -1;
    }
    let data = core::slice::from_raw_parts(data, data_len);
    match roi::decode::decode_header(data) {
        Ok(d) => {
            (*desc).fill_from(&d);
            0
        }
        Err(_) => -1,
    }
}

/// Decode a complete stream into a caller-allocated pixel buffer.
///
/// `channels` 0 uses the header's channel count, 3 or 4 force the output
/// layout. On success fills `desc` and returns the number of pixel bytes
/// written; returns -1 on any error.
///
/// # Safety
///
/// - `data` must be valid for reads of `data_len` bytes
/// - `desc` must point to writable `RoiDescriptor` storage
/// - `out` must be valid for writes of `out_len` bytes
#[no_mangle]
pub unsafe extern "C" fn roi_decode(
    data: *const u8,
    data_len: usize,
    channels: u8,
    desc: *mut RoiDescriptor,
    out: *mut u8,
    out_len: usize,
) -> isize {
    if data.is_null() || desc.is_null() || out.is_null() {
        return -1;
    }
    let requested = match channels {
        0 => None,
        n => match Channels::from_u8(n) {
            Some(c) => Some(c),
            None => return -1,
        },
    };
    let data = core::slice::from_raw_parts(data, data_len);
    let out = core::slice::from_raw_parts_mut(out, out_len);
    match roi::decode::decode_to_buf(data, requested, out) {
        Ok((d, written)) => {
            (*desc).fill_from(&d);
            written as isize
        }
        Err(_) => -1,
    }
}
