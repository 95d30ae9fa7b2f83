use std::{
    env::{self, VarError},
    panic::catch_unwind,
    process,
};

use anyhow::anyhow;
use image::ImageBuffer;
use once_cell::sync::Lazy;

use super::Image;

/// Decoders that can be selected with `POSECAM_JPEG_BACKEND`.
#[derive(Debug)]
enum JpegBackend {
    /// Uses the `jpeg-decoder` crate (via `image`), a robust but slow pure-Rust JPEG decoder.
    JpegDecoder,
    /// Uses the `mozjpeg` crate, a wrapper around Mozilla's libjpeg fork. Robust and fast-ish, but
    /// C.
    MozJpeg,
}

const DEFAULT_BACKEND: JpegBackend = JpegBackend::MozJpeg;

static JPEG_BACKEND: Lazy<JpegBackend> = Lazy::new(|| {
    let backend = match env::var("POSECAM_JPEG_BACKEND") {
        Ok(v) if v == "mozjpeg" => JpegBackend::MozJpeg,
        Ok(v) if v == "jpeg-decoder" => JpegBackend::JpegDecoder,
        Ok(v) => {
            eprintln!("invalid value set for `POSECAM_JPEG_BACKEND` variable: '{v}'; exiting");
            process::exit(1);
        }
        Err(VarError::NotPresent) => DEFAULT_BACKEND,
        Err(VarError::NotUnicode(s)) => {
            eprintln!(
                "invalid value set for `POSECAM_JPEG_BACKEND` variable: {}; exiting",
                s.to_string_lossy()
            );
            process::exit(1);
        }
    };
    log::debug!("using JPEG decode backend: {:?}", backend);
    backend
});

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let buf = match *JPEG_BACKEND {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::MozJpeg => {
            // mozjpeg crate unfortunately reports errors only via unwinding
            let (buf, width, height) = catch_unwind(|| -> anyhow::Result<_> {
                let mut decompress = mozjpeg::Decompress::new_mem(data)?;

                // Tune settings for decode performance.
                decompress.do_fancy_upsampling(false);
                decompress.dct_method(mozjpeg::DctMethod::IntegerFast);

                let mut decompress = decompress.rgba()?;
                let buf = decompress
                    .read_scanlines_flat()
                    .ok_or_else(|| anyhow!("failed to decode image"))?;
                Ok((buf, decompress.width(), decompress.height()))
            })
            .map_err(|payload| match payload.downcast::<String>() {
                Ok(string) => anyhow::Error::msg(string),
                Err(_) => anyhow!("<unknown panic message>"),
            })??;

            ImageBuffer::from_raw(u32::try_from(width)?, u32::try_from(height)?, buf)
                .ok_or_else(|| anyhow!("decoded JPEG has an unexpected buffer size"))?
        }
    };

    Ok(Image { buf })
}
