//! V4L2 webcam access.
//!
//! Only `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Color, Image, Resolution};
use crate::timer::Timer;

/// Largest resolution picked automatically. Anything above only slows down decoding and drawing.
const MAX_AUTO_RESOLUTION: Resolution = Resolution::RES_720P;

/// Format negotiation options.
#[derive(Debug, Clone, Default)]
pub struct WebcamOptions {
    name: Option<String>,
    fps: Option<u32>,
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired frame rate. A lower one is used if the device cannot deliver it.
    pub fn fps(self, fps: u32) -> Self {
        Self {
            fps: Some(fps),
            ..self
        }
    }
}

/// A frame size and rate offered by a device.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Mode {
    resolution: Resolution,
    fps: f32,
}

/// Picks the mode to capture with.
///
/// Modes reaching the requested frame rate are preferred. Among those, the largest resolution not
/// exceeding [`MAX_AUTO_RESOLUTION`] wins; if every mode is larger, the smallest one is used. When
/// no mode is fast enough, the fastest one is used.
fn select_mode(modes: &[Mode], fps: Option<u32>) -> Option<usize> {
    let fast_enough = |m: &Mode| fps.map_or(true, |fps| m.fps.round() >= fps as f32);
    let fits = |m: &Mode| {
        m.resolution.width() <= MAX_AUTO_RESOLUTION.width()
            && m.resolution.height() <= MAX_AUTO_RESOLUTION.height()
    };

    let candidates = modes
        .iter()
        .enumerate()
        .filter(|&(_, m)| fast_enough(m))
        .collect::<Vec<_>>();
    if candidates.is_empty() {
        return modes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.fps.total_cmp(&b.fps))
            .map(|(i, _)| i);
    }

    let best_fitting = candidates
        .iter()
        .filter(|&&(_, m)| fits(m))
        .max_by_key(|(_, m)| m.resolution.num_pixels());
    let smallest = candidates
        .iter()
        .min_by_key(|(_, m)| m.resolution.num_pixels());
    best_fitting.or(smallest).map(|(i, _)| *i)
}

fn negotiate_format(device: &Device, fps: Option<u32>) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }
    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut modes = Vec::new();
    let mut intervals = Vec::new();
    let FrameSizes::Discrete(sizes) = device.frame_sizes(pixel_format)? else {
        bail!("stepwise or continuous resolutions are not supported");
    };
    for size in sizes {
        let FrameIntervals::Discrete(rates) =
            device.frame_intervals(pixel_format, size.width(), size.height())?
        else {
            bail!("stepwise or continuous frame rates are not supported");
        };
        for rate in rates {
            let interval = *rate.fract();
            modes.push(Mode {
                resolution: Resolution::new(size.width(), size.height()),
                fps: 1.0 / interval.as_f32(),
            });
            intervals.push(interval);
        }
    }
    log::debug!("available modes: {:?}", modes);

    let Some(index) = select_mode(&modes, fps) else {
        bail!("device offers no frame sizes");
    };
    let mode = modes[index];
    Ok((
        PixFormat::new(
            mode.resolution.width(),
            mode.resolution.height(),
            pixel_format,
        ),
        intervals[index],
    ))
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    fps: u32,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the webcam selected by `options`, or the first supported one.
    ///
    /// This can block for a few hundred milliseconds while the device initializes.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_device(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => log::debug!("{e:#}"),
                },
                Err(e) => log::warn!("{e}"),
            }
        }

        match &options.name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_device(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name.as_str() {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );
        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, interval) = negotiate_format(&dev, options.fps)?;
        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(interval)?;
        let fps = (1.0 / actual.as_f32()).round();
        let fps = if fps.is_finite() && fps > 0.0 { fps as u32 } else { 0 };

        log::info!(
            "opened {} ({}), {} @ {}Hz",
            caps.card(),
            path.display(),
            resolution,
            fps,
        );

        Ok(Some(Self {
            stream: capture.into_stream(2)?,
            resolution,
            fps,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the negotiated frame rate, or 0 if the device did not report a usable one.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Reads the next frame, blocking until one is available.
    ///
    /// Corrupted frames are replaced by a blank image of the right size instead of failing.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let resolution = self.resolution;
        let t_decode = &self.t_decode;
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                Ok(t_decode.time(|| decode_or_blank(&buf, resolution)))
            })
            .map_err(Into::into)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

/// Decodes an MJPEG frame, substituting a black frame of `resolution` if it is corrupt.
fn decode_or_blank(jpeg: &[u8], resolution: Resolution) -> Image {
    match Image::decode_jpeg(jpeg) {
        Ok(image) => image,
        Err(e) => {
            // Even good webcams emit the occasional broken MJPEG frame.
            log::error!("webcam decode error: {e:#}");
            Image::filled(resolution, Color::BLACK)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(w: u32, h: u32, fps: f32) -> Mode {
        Mode {
            resolution: Resolution::new(w, h),
            fps,
        }
    }

    #[test]
    fn corrupt_frame_is_blank() {
        let res = Resolution::new(32, 24);
        let image = decode_or_blank(b"\xff\xd8 definitely not a jpeg", res);
        assert_eq!(image.resolution(), res);
        assert!(image.data().chunks_exact(4).all(|px| px == [0, 0, 0, 255]));

        assert_eq!(decode_or_blank(&[], res).resolution(), res);
    }

    #[test]
    fn intact_frame_is_decoded() {
        let jpeg = Image::filled(Resolution::new(16, 8), Color::WHITE)
            .encode_jpeg(90)
            .unwrap();
        let image = decode_or_blank(&jpeg, Resolution::new(32, 24));
        assert_eq!(image.resolution(), Resolution::new(16, 8));
    }

    #[test]
    fn prefers_largest_fitting_resolution() {
        let modes = [
            mode(320, 240, 30.0),
            mode(1280, 720, 30.0),
            mode(1920, 1080, 30.0),
            mode(640, 480, 30.0),
        ];
        assert_eq!(select_mode(&modes, Some(30)), Some(1));
    }

    #[test]
    fn keeps_frame_rate() {
        let modes = [mode(1280, 720, 10.0), mode(640, 480, 29.97)];
        assert_eq!(select_mode(&modes, Some(30)), Some(1));
        assert_eq!(select_mode(&modes, None), Some(0));
    }

    #[test]
    fn falls_back() {
        let modes = [mode(640, 480, 15.0), mode(320, 240, 20.0)];
        assert_eq!(select_mode(&modes, Some(60)), Some(1));

        let huge = [mode(3840, 2160, 30.0), mode(1920, 1080, 30.0)];
        assert_eq!(select_mode(&huge, Some(30)), Some(1));

        assert_eq!(select_mode(&[], Some(30)), None);
    }
}
