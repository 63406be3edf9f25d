use argh::FromArgs;
use image::{ImageFormat, RgbImage, RgbaImage};
use roi::{
    decode::{decode_header, decode_stream, decode_to_vec},
    encode::RoiEncodeContext,
    Channels, Codepath, Colorspace, Descriptor,
};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor},
    str::FromStr,
};

mod netpbm;

/// ROI cli encoder and decoder.
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Encode(Encode),
    Decode(Decode),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Format {
    Png,
    Jpg,
    Bmp,
    Ppm,
    Pam,
}

impl FromStr for Format {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        #[rustfmt::skip]
        let Some(format) = s.eq_ignore_ascii_case("png").then_some(Format::Png)
               .or_else(|| s.eq_ignore_ascii_case("jpg").then_some(Format::Jpg))
               .or_else(|| s.eq_ignore_ascii_case("jpeg").then_some(Format::Jpg))
               .or_else(|| s.eq_ignore_ascii_case("bmp").then_some(Format::Bmp))
               .or_else(|| s.eq_ignore_ascii_case("ppm").then_some(Format::Ppm))
               .or_else(|| s.eq_ignore_ascii_case("pam").then_some(Format::Pam))
        else { return Err("invalid format"); };

        Ok(format)
    }
}

impl Format {
    fn guess(path: &str) -> Option<Format> {
        let ext = path.rsplit_once('.')?.1;
        Format::from_str(ext).ok()
    }

    fn image_format(self) -> Option<ImageFormat> {
        match self {
            Format::Png => Some(ImageFormat::Png),
            Format::Jpg => Some(ImageFormat::Jpeg),
            Format::Bmp => Some(ImageFormat::Bmp),
            Format::Ppm | Format::Pam => None,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Cli { command } = argh::from_env();

    match command {
        Command::Encode(options) => encode(options),
        Command::Decode(options) => decode(options),
    }
}

/// Encodes an image as ROI.
#[derive(FromArgs)]
#[argh(subcommand, name = "encode")]
struct Encode {
    /// input format (png, jpg, bmp, ppm, pam); guessed from the file
    /// extension if omitted
    #[argh(option)]
    format: Option<Format>,

    /// use the vectorised encoder kernel
    #[argh(switch)]
    simd: bool,

    /// the input image
    #[argh(positional)]
    input: String,
    /// the output .roi file
    #[argh(positional)]
    output: String,
}

fn encode(options: Encode) -> Result<(), Box<dyn std::error::Error>> {
    let Encode {
        format,
        simd,
        input,
        output,
    } = options;

    let codepath = if simd { Codepath::Simd } else { Codepath::Scalar };
    let format = format
        .or_else(|| Format::guess(&input))
        .ok_or("cannot guess the input format, pass --format")?;

    match format {
        // netpbm input streams straight through the encoder, one pixel
        // window at a time
        Format::Ppm | Format::Pam => {
            let mut reader = BufReader::new(File::open(&input)?);
            let header = match format {
                Format::Ppm => netpbm::read_ppm_header(&mut reader)?,
                _ => netpbm::read_pam_header(&mut reader)?,
            };
            let desc = Descriptor {
                width: header.width,
                height: header.height,
                channels: header.channels,
                colorspace: Colorspace::Srgb,
            };
            println!(
                "Encoding {}x{} image ({} channels, streaming)",
                desc.width,
                desc.height,
                desc.channels.bytes()
            );
            let mut writer = BufWriter::new(File::create(&output)?);
            RoiEncodeContext::encode_stream(&mut reader, &desc, codepath, &mut writer)?;
        }
        _ => {
            let image = image::io::Reader::with_format(
                BufReader::new(File::open(&input)?),
                format.image_format().expect("non-netpbm format"),
            )
            .decode()?;

            let width = image.width();
            let height = image.height();
            println!("Encoding {width}x{height} image");

            let (channels, raw) = if image.color().has_alpha() {
                (Channels::Rgba, image.into_rgba8().into_raw())
            } else {
                (Channels::Rgb, image.into_rgb8().into_raw())
            };
            let desc = Descriptor {
                width,
                height,
                channels,
                colorspace: Colorspace::Srgb,
            };
            let encoded = RoiEncodeContext::encode_to_vec(&raw, &desc, codepath)?;
            std::fs::write(&output, &encoded)?;
            println!("Written {} bytes to `{output}`", encoded.len());
        }
    }

    Ok(())
}

/// Decodes a ROI image.
#[derive(FromArgs)]
#[argh(subcommand, name = "decode")]
struct Decode {
    /// output format (png, jpg, bmp, ppm, pam); guessed from the file
    /// extension if omitted
    #[argh(option)]
    format: Option<Format>,

    /// the input .roi file
    #[argh(positional)]
    input: String,
    /// the output image
    #[argh(positional)]
    output: String,
}

fn decode(options: Decode) -> Result<(), Box<dyn std::error::Error>> {
    let Decode {
        format,
        input,
        output,
    } = options;

    let format = format
        .or_else(|| Format::guess(&output))
        .ok_or("cannot guess the output format, pass --format")?;

    let data = std::fs::read(&input)?;
    println!("Decoding `{input}`");

    match format {
        Format::Ppm => {
            let desc = decode_header(&data)?;
            let mut writer = BufWriter::new(File::create(&output)?);
            netpbm::write_ppm_header(&mut writer, desc.width, desc.height)?;
            decode_stream(Cursor::new(&data), Some(Channels::Rgb), &mut writer)?;
            println!("Written {}x{} image to `{output}`", desc.width, desc.height);
        }
        Format::Pam => {
            let desc = decode_header(&data)?;
            let mut writer = BufWriter::new(File::create(&output)?);
            netpbm::write_pam_header(&mut writer, desc.width, desc.height, desc.channels)?;
            decode_stream(Cursor::new(&data), Some(desc.channels), &mut writer)?;
            println!("Written {}x{} image to `{output}`", desc.width, desc.height);
        }
        _ => {
            let image_format = format.image_format().expect("non-netpbm format");
            // jpg/bmp writers in `image` take no alpha
            let force_rgb = matches!(format, Format::Jpg | Format::Bmp);

            let (desc, pixels) = if force_rgb {
                decode_to_vec(&data, Some(Channels::Rgb))?
            } else {
                decode_to_vec(&data, None)?
            };

            if force_rgb || desc.channels == Channels::Rgb {
                RgbImage::from_vec(desc.width, desc.height, pixels)
                    .ok_or("failed to create image")?
                    .save_with_format(&output, image_format)?;
            } else {
                RgbaImage::from_vec(desc.width, desc.height, pixels)
                    .ok_or("failed to create image")?
                    .save_with_format(&output, image_format)?;
            }
            println!("Written {}x{} image to `{output}`", desc.width, desc.height);
        }
    }

    Ok(())
}
