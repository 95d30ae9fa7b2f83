//! Snapshot and video output.
//!
//! Recordings are encoded by a [`VideoSink`] running on a background [`Worker`], so the frame
//! loop only hands frames over. The default sink pipes raw RGBA frames into `ffmpeg`, which writes
//! MPEG-4 Part 2 video (FourCC `mp4v`) into an `.mp4` container.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use chrono::{DateTime, Local};
use crossbeam::channel::{self, Receiver};
use pawawwewism::{promise, Promise, Worker};

use crate::image::{Image, Resolution};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Builds a file name like `capture_20240131_174501.jpg`.
pub fn timestamped_name(prefix: &str, extension: &str, time: DateTime<Local>) -> String {
    format!("{}.{extension}", timestamped_stem(prefix, time))
}

fn timestamped_stem(prefix: &str, time: DateTime<Local>) -> String {
    format!("{prefix}_{}", time.format(TIMESTAMP_FORMAT))
}

/// Returns `dir/stem.extension`, or `dir/stem_N.extension` with the smallest `N` that doesn't
/// exist yet.
fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let path = dir.join(format!("{stem}.{extension}"));
    if !path.exists() {
        return path;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.{extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

fn output_path(dir: &Path, prefix: &str, extension: &str) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    Ok(unique_path(
        dir,
        &timestamped_stem(prefix, Local::now()),
        extension,
    ))
}

/// Saves `image` as a timestamped JPEG in `dir` and returns its path.
pub fn save_snapshot(image: &Image, dir: &Path, quality: u8) -> anyhow::Result<PathBuf> {
    let path = output_path(dir, "capture", "jpg")?;
    image.save_with_quality(&path, quality)?;
    Ok(path)
}

/// Consumer of encoded video frames.
pub trait VideoSink: Send {
    /// Appends a frame. Its resolution is the one the sink was created with.
    fn write_frame(&mut self, frame: &Image) -> anyhow::Result<()>;

    /// Flushes all frames and finalizes the output file.
    fn finish(self: Box<Self>) -> anyhow::Result<()>;
}

/// Creates a [`VideoSink`] for each recording.
pub trait SinkFactory {
    fn create(
        &self,
        path: &Path,
        resolution: Resolution,
        fps: u32,
    ) -> anyhow::Result<Box<dyn VideoSink>>;
}

/// Encodes video with an external `ffmpeg` process.
pub struct FfmpegFactory {
    program: PathBuf,
}

impl FfmpegFactory {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(path: &Path, resolution: Resolution, fps: u32) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(resolution.to_string().into());
        args.extend(["-r".into(), fps.to_string().into(), "-i".into(), "-".into()]);
        args.extend(
            ["-an", "-c:v", "mpeg4", "-tag:v", "mp4v", "-q:v", "4", "-pix_fmt", "yuv420p"]
                .into_iter()
                .map(OsString::from),
        );
        args.push(path.into());
        args
    }
}

impl SinkFactory for FfmpegFactory {
    fn create(
        &self,
        path: &Path,
        resolution: Resolution,
        fps: u32,
    ) -> anyhow::Result<Box<dyn VideoSink>> {
        let mut child = Command::new(&self.program)
            .args(Self::args(path, resolution, fps))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start `{}`", self.program.display()))?;
        let stdin = child
            .stdin
            .take()
            .context("ffmpeg process has no standard input")?;
        log::debug!("spawned ffmpeg (pid {}) for {}", child.id(), path.display());

        Ok(Box::new(FfmpegSink {
            child,
            stdin: Some(stdin),
            path: path.to_path_buf(),
        }))
    }
}

struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
}

impl VideoSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Image) -> anyhow::Result<()> {
        let stdin = self.stdin.as_mut().context("ffmpeg input already closed")?;
        stdin
            .write_all(frame.data())
            .context("failed to send frame to ffmpeg")
    }

    fn finish(mut self: Box<Self>) -> anyhow::Result<()> {
        // Closing stdin makes ffmpeg write the trailer and exit.
        drop(self.stdin.take());
        let status = self.child.wait().context("failed to wait for ffmpeg")?;
        if !status.success() {
            bail!("ffmpeg failed to encode {} ({status})", self.path.display());
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            self.child.wait().ok();
        }
    }
}

/// A frame sequence captured by [`MemoryFactory`].
#[derive(Debug, Clone, Default)]
pub struct MemoryRecording {
    pub path: PathBuf,
    pub resolution: Option<Resolution>,
    pub fps: u32,
    pub frames: Vec<Image>,
    pub finished: bool,
}

/// [`SinkFactory`] that keeps recorded frames in memory instead of encoding them.
///
/// Useful for exercising the recording logic without an encoder.
#[derive(Clone, Default)]
pub struct MemoryFactory {
    recordings: Arc<Mutex<Vec<MemoryRecording>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recordings started so far.
    pub fn recordings(&self) -> Vec<MemoryRecording> {
        match self.recordings.lock() {
            Ok(recs) => recs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SinkFactory for MemoryFactory {
    fn create(
        &self,
        path: &Path,
        resolution: Resolution,
        fps: u32,
    ) -> anyhow::Result<Box<dyn VideoSink>> {
        let mut recs = self
            .recordings
            .lock()
            .map_err(|_| anyhow::anyhow!("recording list poisoned"))?;
        recs.push(MemoryRecording {
            path: path.to_path_buf(),
            resolution: Some(resolution),
            fps,
            frames: Vec::new(),
            finished: false,
        });
        Ok(Box::new(MemorySink {
            recordings: self.recordings.clone(),
            index: recs.len() - 1,
        }))
    }
}

struct MemorySink {
    recordings: Arc<Mutex<Vec<MemoryRecording>>>,
    index: usize,
}

impl MemorySink {
    fn with<R>(&self, f: impl FnOnce(&mut MemoryRecording) -> R) -> anyhow::Result<R> {
        let mut recs = self
            .recordings
            .lock()
            .map_err(|_| anyhow::anyhow!("recording list poisoned"))?;
        Ok(f(&mut recs[self.index]))
    }
}

impl VideoSink for MemorySink {
    fn write_frame(&mut self, frame: &Image) -> anyhow::Result<()> {
        self.with(|rec| rec.frames.push(frame.clone()))
    }

    fn finish(self: Box<Self>) -> anyhow::Result<()> {
        self.with(|rec| rec.finished = true)
    }
}

enum Message {
    Frame(Image),
    Finish(Promise<anyhow::Result<usize>>),
}

/// A running recording.
///
/// Frames passed to [`Recorder::write`] are resized to the recording resolution if needed and
/// written by a worker thread. Dropping a `Recorder` without calling [`Recorder::stop`] still
/// finalizes the file, but any error is only logged.
///
/// If the sink fails to write a frame, the recording is aborted: later frames are discarded and
/// the error is reported once by [`Recorder::take_error`].
pub struct Recorder {
    worker: Option<Worker<Message>>,
    errors: Receiver<anyhow::Error>,
    path: PathBuf,
    resolution: Resolution,
    fps: u32,
}

impl Recorder {
    /// Starts a new timestamped recording in `dir`.
    pub fn start(
        factory: &dyn SinkFactory,
        dir: &Path,
        resolution: Resolution,
        fps: u32,
    ) -> anyhow::Result<Self> {
        let path = output_path(dir, "recording", "mp4")?;
        let sink = factory.create(&path, resolution, fps)?;

        let mut sink = Some(sink);
        let mut frames = 0;
        let name = path.display().to_string();
        let (error_tx, errors) = channel::bounded(1);
        let worker = Worker::builder()
            .name(format!("recorder {name}"))
            .spawn(move |msg: Message| match msg {
                Message::Frame(frame) => {
                    let Some(s) = &mut sink else { return };
                    let frame = if frame.resolution() == resolution {
                        frame
                    } else {
                        frame.resize(resolution)
                    };
                    match s.write_frame(&frame) {
                        Ok(()) => frames += 1,
                        Err(e) => {
                            log::error!("recording to {name} failed: {e:#}");
                            sink = None;
                            error_tx.try_send(e).ok();
                        }
                    }
                }
                Message::Finish(promise) => {
                    let result = match sink.take() {
                        Some(s) => s.finish().map(|()| frames),
                        None => Err(anyhow::anyhow!("recording to {name} was aborted")),
                    };
                    promise.fulfill(result);
                }
            })
            .context("failed to spawn recorder thread")?;

        Ok(Self {
            worker: Some(worker),
            errors,
            path,
            resolution,
            fps,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Queues a frame for writing.
    pub fn write(&mut self, frame: &Image) {
        if let Some(worker) = &mut self.worker {
            worker.send(Message::Frame(frame.clone()));
        }
    }

    /// Returns the error that aborted this recording, if writing a frame has failed since the
    /// last call.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.errors.try_recv().ok()
    }

    /// Writes all queued frames, finalizes the file and returns the number of frames written.
    pub fn stop(mut self) -> anyhow::Result<usize> {
        self.finish()
    }

    fn finish(&mut self) -> anyhow::Result<usize> {
        let Some(mut worker) = self.worker.take() else {
            return Ok(0);
        };
        let (promise, handle) = promise();
        worker.send(Message::Finish(promise));
        drop(worker);
        match handle.block() {
            Ok(result) => result,
            Err(_) => bail!("recorder thread for {} exited", self.path.display()),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("{e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::image::Color;

    #[test]
    fn names() {
        let time = Local.with_ymd_and_hms(2024, 1, 31, 17, 45, 1).unwrap();
        assert_eq!(
            timestamped_name("capture", "jpg", time),
            "capture_20240131_174501.jpg"
        );
        assert_eq!(
            timestamped_name("recording", "mp4", time),
            "recording_20240131_174501.mp4"
        );
    }

    #[test]
    fn existing_names_get_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let stem = "capture_20240131_174501";
        assert_eq!(
            unique_path(dir.path(), stem, "jpg"),
            dir.path().join("capture_20240131_174501.jpg")
        );

        fs::write(dir.path().join("capture_20240131_174501.jpg"), b"").unwrap();
        fs::write(dir.path().join("capture_20240131_174501_1.jpg"), b"").unwrap();
        assert_eq!(
            unique_path(dir.path(), stem, "jpg"),
            dir.path().join("capture_20240131_174501_2.jpg")
        );
    }

    #[test]
    fn snapshots_in_quick_succession() {
        let dir = tempfile::tempdir().unwrap();
        let image = Image::filled(Resolution::new(8, 8), Color::RED);
        let first = save_snapshot(&image, dir.path(), 90).unwrap();
        let second = save_snapshot(&image, dir.path(), 90).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn ffmpeg_arguments() {
        let args = FfmpegFactory::args(Path::new("out/rec.mp4"), Resolution::new(640, 480), 30);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        let joined = args.join(" ");
        assert!(joined.contains("-s 640x480 -r 30 -i -"), "{joined}");
        assert!(joined.contains("-c:v mpeg4 -tag:v mp4v"), "{joined}");
        assert_eq!(args.last().map(String::as_str), Some("out/rec.mp4"));
    }

    #[test]
    fn snapshot_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shots");
        let image = Image::filled(Resolution::new(16, 8), Color::RED);
        let path = save_snapshot(&image, &out, 90).unwrap();

        assert!(path.starts_with(&out));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("capture_") && name.ends_with(".jpg"), "{name}");
        assert_eq!(Image::load(&path).unwrap().resolution(), image.resolution());
    }

    #[test]
    fn recorder_resizes_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MemoryFactory::new();
        let res = Resolution::new(8, 6);
        let mut rec = Recorder::start(&factory, dir.path(), res, 25).unwrap();
        rec.write(&Image::filled(res, Color::BLUE));
        rec.write(&Image::filled(Resolution::new(16, 12), Color::GREEN));
        assert_eq!(rec.stop().unwrap(), 2);

        let recs = factory.recordings();
        assert_eq!(recs.len(), 1);
        assert!(recs[0].finished);
        assert_eq!(recs[0].fps, 25);
        assert_eq!(recs[0].frames.len(), 2);
        assert!(recs[0].frames.iter().all(|f| f.resolution() == res));
        assert!(recs[0].path.to_string_lossy().ends_with(".mp4"));
    }

    #[test]
    fn dropped_recorder_is_finalized() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MemoryFactory::new();
        let rec = Recorder::start(&factory, dir.path(), Resolution::new(4, 4), 30).unwrap();
        drop(rec);
        assert!(factory.recordings()[0].finished);
    }

    struct Broken;

    impl VideoSink for Broken {
        fn write_frame(&mut self, _: &Image) -> anyhow::Result<()> {
            bail!("disk full")
        }

        fn finish(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct BrokenFactory;

    impl SinkFactory for BrokenFactory {
        fn create(&self, _: &Path, _: Resolution, _: u32) -> anyhow::Result<Box<dyn VideoSink>> {
            Ok(Box::new(Broken))
        }
    }

    #[test]
    fn write_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let res = Resolution::new(4, 4);
        let mut rec = Recorder::start(&BrokenFactory, dir.path(), res, 30).unwrap();
        assert!(rec.take_error().is_none());

        // Each send waits for the worker, so the first failure is visible after the next frame.
        let frame = Image::filled(res, Color::BLUE);
        rec.write(&frame);
        rec.write(&frame);
        rec.write(&frame);
        let err = rec.take_error().unwrap();
        assert_eq!(err.to_string(), "disk full");
        assert!(rec.take_error().is_none());

        let err = rec.stop().unwrap_err();
        assert!(err.to_string().contains("aborted"), "{err}");
    }

    #[test]
    fn missing_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FfmpegFactory::new(dir.path().join("no-such-ffmpeg"));
        let err = Recorder::start(&factory, dir.path(), Resolution::new(4, 4), 30)
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("failed to start"), "{err:#}");
    }
}
