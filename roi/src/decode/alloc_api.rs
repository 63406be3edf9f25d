use super::{decode_header, decode_to_buf, DecodeError, UnexpectedEofSnafu};
use crate::{Channels, Descriptor, HEADER_SIZE, PADDING};
use alloc::vec::Vec;
use snafu::ensure;

/// Decode a complete in-memory stream.
///
/// `channels` selects the output layout; `None` uses the header's. A
/// 4-channel stream decoded to 3 channels drops alpha, a 3-channel stream
/// decoded to 4 channels gets alpha 255.
pub fn decode_to_vec(
    data: &[u8],
    channels: Option<Channels>,
) -> Result<(Descriptor, Vec<u8>), DecodeError> {
    ensure!(
        data.len() >= HEADER_SIZE + PADDING.len(),
        UnexpectedEofSnafu
    );
    let desc = decode_header(data)?;
    let out_channels = channels.unwrap_or(desc.channels);
    let mut out = alloc::vec![0u8; desc.pixel_count() as usize * out_channels.bytes()];
    decode_to_buf(data, Some(out_channels), &mut out)?;
    Ok((desc, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode::RoiEncodeContext, Codepath, Colorspace};

    #[test]
    fn decode_requires_end_marker() {
        let desc = Descriptor {
            width: 2,
            height: 2,
            channels: Channels::Rgb,
            colorspace: Colorspace::Srgb,
        };
        let pixels = [10u8, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120];
        let mut encoded =
            RoiEncodeContext::encode_to_vec(&pixels, &desc, Codepath::Scalar).unwrap();
        assert!(decode_to_vec(&encoded, None).is_ok());

        encoded.pop();
        assert!(matches!(
            decode_to_vec(&encoded, None),
            Err(DecodeError::MissingEndMarker)
        ));
    }

    #[test]
    fn too_short_input_is_eof() {
        assert!(matches!(
            decode_to_vec(&[0u8; 12], None),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
