//! Minimal PPM (P6) and PAM (P7) container support, 8-bit only.
//!
//! Both parsers stop right after the header, leaving the reader at the
//! first raw pixel byte so the codec can stream the body.

use std::error::Error;
use std::io::{BufRead, Read, Write};

use roi::Channels;

#[derive(Debug, Clone, Copy)]
pub struct NetpbmHeader {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
}

fn read_byte<R: BufRead>(r: &mut R) -> Result<u8, Box<dyn Error>> {
    let mut byte = [0u8; 1];
    r.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// One whitespace-delimited token, skipping `#` comments.
fn read_token<R: BufRead>(r: &mut R) -> Result<String, Box<dyn Error>> {
    let mut token = String::new();
    loop {
        let b = read_byte(r)?;
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                if !token.is_empty() {
                    return Ok(token);
                }
            }
            b'#' => {
                if !token.is_empty() {
                    return Ok(token);
                }
                while read_byte(r)? != b'\n' {}
            }
            _ => token.push(b as char),
        }
    }
}

fn parse_dim(token: &str, what: &str) -> Result<u32, Box<dyn Error>> {
    let value: u32 = token
        .parse()
        .map_err(|_| format!("bad {what} in netpbm header: `{token}`"))?;
    if value == 0 {
        return Err(format!("{what} must be non-zero").into());
    }
    Ok(value)
}

/// Parse a P6 header. The reader ends up positioned at the raw RGB data.
pub fn read_ppm_header<R: BufRead>(r: &mut R) -> Result<NetpbmHeader, Box<dyn Error>> {
    let mut magic = [0u8; 2];
    r.read_exact(&mut magic)?;
    if &magic != b"P6" {
        return Err("not a P6 ppm file".into());
    }
    let width = parse_dim(&read_token(r)?, "width")?;
    let height = parse_dim(&read_token(r)?, "height")?;
    let maxval: u32 = read_token(r)?.parse()?;
    if maxval == 0 || maxval > 255 {
        return Err("only 8-bit ppm files are supported".into());
    }
    // the single whitespace after maxval was consumed by the tokenizer
    Ok(NetpbmHeader {
        width,
        height,
        channels: Channels::Rgb,
    })
}

/// Parse a P7 header up to and including `ENDHDR`.
pub fn read_pam_header<R: BufRead>(r: &mut R) -> Result<NetpbmHeader, Box<dyn Error>> {
    let mut magic = [0u8; 3];
    r.read_exact(&mut magic)?;
    if &magic != b"P7\n" {
        return Err("not a P7 pam file".into());
    }

    let (mut width, mut height, mut depth, mut maxval) = (None, None, None, None);
    loop {
        let mut line = String::new();
        if r.read_line(&mut line)? == 0 {
            return Err("pam header ended before ENDHDR".into());
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_ascii_whitespace();
        match parts.next() {
            Some("ENDHDR") => break,
            Some("WIDTH") => width = Some(parse_dim(parts.next().unwrap_or(""), "width")?),
            Some("HEIGHT") => height = Some(parse_dim(parts.next().unwrap_or(""), "height")?),
            Some("DEPTH") => depth = parts.next().and_then(|t| t.parse::<u32>().ok()),
            Some("MAXVAL") => maxval = parts.next().and_then(|t| t.parse::<u32>().ok()),
            Some("TUPLTYPE") => {}
            _ => return Err(format!("unexpected pam header line `{line}`").into()),
        }
    }

    let width = width.ok_or("pam header is missing WIDTH")?;
    let height = height.ok_or("pam header is missing HEIGHT")?;
    let channels = match depth {
        Some(3) => Channels::Rgb,
        Some(4) => Channels::Rgba,
        _ => return Err("only DEPTH 3 or 4 pam files are supported".into()),
    };
    if maxval != Some(255) {
        return Err("only MAXVAL 255 pam files are supported".into());
    }
    Ok(NetpbmHeader {
        width,
        height,
        channels,
    })
}

pub fn write_ppm_header<W: Write>(w: &mut W, width: u32, height: u32) -> std::io::Result<()> {
    write!(w, "P6\n{width} {height}\n255\n")
}

pub fn write_pam_header<W: Write>(
    w: &mut W,
    width: u32,
    height: u32,
    channels: Channels,
) -> std::io::Result<()> {
    let (depth, tupltype) = match channels {
        Channels::Rgb => (3, "RGB"),
        Channels::Rgba => (4, "RGB_ALPHA"),
    };
    write!(
        w,
        "P7\nWIDTH {width}\nHEIGHT {height}\nDEPTH {depth}\nMAXVAL 255\nTUPLTYPE {tupltype}\nENDHDR\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn ppm_header_roundtrip() {
        let mut buf = Vec::new();
        write_ppm_header(&mut buf, 640, 480).unwrap();
        buf.extend_from_slice(&[1, 2, 3]);
        let mut cursor = Cursor::new(buf);
        let header = read_ppm_header(&mut cursor).unwrap();
        assert_eq!((header.width, header.height), (640, 480));
        // reader must now sit at the pixel data
        let mut px = [0u8; 3];
        cursor.read_exact(&mut px).unwrap();
        assert_eq!(px, [1, 2, 3]);
    }

    #[test]
    fn ppm_comments_are_skipped() {
        let data = b"P6\n# made by hand\n2 # inline\n2\n255\nxxxxxxxxxxxx";
        let header = read_ppm_header(&mut Cursor::new(&data[..])).unwrap();
        assert_eq!((header.width, header.height), (2, 2));
    }

    #[test]
    fn pam_header_roundtrip() {
        let mut buf = Vec::new();
        write_pam_header(&mut buf, 31, 17, Channels::Rgba).unwrap();
        let header = read_pam_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!((header.width, header.height), (31, 17));
        assert_eq!(header.channels, Channels::Rgba);
    }

    #[test]
    fn pam_rejects_16_bit() {
        let data = b"P7\nWIDTH 2\nHEIGHT 2\nDEPTH 3\nMAXVAL 65535\nENDHDR\n";
        assert!(read_pam_header(&mut Cursor::new(&data[..])).is_err());
    }
}
