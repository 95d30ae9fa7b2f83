//! Command line options and the validated settings derived from them.
//!
//! The networks are looked up in the model directory (`--models`, or `POSECAM_MODEL_DIR`) under
//! these file names:
//!
//! - `pose_detection.onnx`
//! - `pose_landmark_lite.onnx`, `pose_landmark_full.onnx`
//! - `hand_landmark_lite.onnx`, `hand_landmark_full.onnx`
//! - `face_landmark.onnx`

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Parser, ValueEnum};

use crate::image::DEFAULT_JPEG_QUALITY;

/// Size/accuracy variant of a landmark network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelVariant {
    Lite,
    Full,
}

impl ModelVariant {
    fn suffix(self) -> &'static str {
        match self {
            ModelVariant::Lite => "lite",
            ModelVariant::Full => "full",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "posecam",
    about = "Webcam viewer with body, hand and face landmarks, pose labels, snapshots and recording"
)]
pub struct Args {
    /// Webcam device name. Defaults to the first device with a supported format.
    #[arg(long, env = "POSECAM_WEBCAM_NAME")]
    pub camera: Option<String>,
    /// Use a still image (JPEG or PNG) as the video source instead of a webcam. Takes precedence
    /// over `--camera`.
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// Directory containing the ONNX networks.
    #[arg(long, env = "POSECAM_MODEL_DIR", default_value = "models")]
    pub models: PathBuf,
    /// Variant of the pose landmark network.
    #[arg(long, value_enum, default_value_t = ModelVariant::Full)]
    pub pose_model: ModelVariant,
    /// Variant of the hand landmark network.
    #[arg(long, value_enum, default_value_t = ModelVariant::Full)]
    pub hand_model: ModelVariant,
    /// Disable face mesh estimation.
    #[arg(long)]
    pub no_face: bool,
    /// Disable hand landmark estimation.
    #[arg(long)]
    pub no_hands: bool,
    /// Minimum confidence for a pose detection to be used (0..1).
    #[arg(long, default_value_t = 0.5)]
    pub min_detection_confidence: f32,
    /// Minimum landmark confidence to keep tracking a pose and to report hands and faces (0..1).
    #[arg(long, default_value_t = 0.5)]
    pub min_tracking_confidence: f32,
    /// Directory snapshots and recordings are written to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Requested camera frame rate, also used for recordings if the camera reports none.
    #[arg(long, default_value_t = 30)]
    pub fps: u32,
    /// JPEG quality of saved snapshots (1..=100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,
    /// `ffmpeg` executable used to encode recordings.
    #[arg(long, env = "POSECAM_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSettings {
    Webcam { name: Option<String> },
    Image(PathBuf),
}

/// Validated application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: SourceSettings,
    pub model_dir: PathBuf,
    pub pose_model: ModelVariant,
    pub hand_model: ModelVariant,
    pub enable_face: bool,
    pub enable_hands: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub output_dir: PathBuf,
    pub fps: u32,
    pub jpeg_quality: u8,
    pub ffmpeg: PathBuf,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> anyhow::Result<Self> {
        check_unit("--min-detection-confidence", args.min_detection_confidence)?;
        check_unit("--min-tracking-confidence", args.min_tracking_confidence)?;
        if !(1..=100).contains(&args.jpeg_quality) {
            bail!(
                "--jpeg-quality must be between 1 and 100, got {}",
                args.jpeg_quality
            );
        }
        if args.fps == 0 {
            bail!("--fps must not be 0");
        }

        let source = match args.image {
            Some(path) => SourceSettings::Image(path),
            None => SourceSettings::Webcam { name: args.camera },
        };

        Ok(Settings {
            source,
            model_dir: args.models,
            pose_model: args.pose_model,
            hand_model: args.hand_model,
            enable_face: !args.no_face,
            enable_hands: !args.no_hands,
            min_detection_confidence: args.min_detection_confidence,
            min_tracking_confidence: args.min_tracking_confidence,
            output_dir: args.output_dir,
            fps: args.fps,
            jpeg_quality: args.jpeg_quality,
            ffmpeg: args.ffmpeg,
        })
    }
}

fn check_unit(name: &str, value: f32) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{name} must be in range 0 to 1, got {value}");
    }
    Ok(())
}

impl Settings {
    /// Parses the process's command line.
    pub fn from_args() -> anyhow::Result<Self> {
        Args::parse().try_into()
    }

    pub fn pose_detection_model(&self) -> PathBuf {
        self.model_dir.join("pose_detection.onnx")
    }

    pub fn pose_landmark_model(&self) -> PathBuf {
        model_file(&self.model_dir, "pose_landmark", self.pose_model)
    }

    pub fn hand_landmark_model(&self) -> PathBuf {
        model_file(&self.model_dir, "hand_landmark", self.hand_model)
    }

    pub fn face_landmark_model(&self) -> PathBuf {
        self.model_dir.join("face_landmark.onnx")
    }
}

fn model_file(dir: &Path, base: &str, variant: ModelVariant) -> PathBuf {
    dir.join(format!("{base}_{}.onnx", variant.suffix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Settings> {
        let args = Args::try_parse_from(["posecam"].iter().chain(args))?;
        args.try_into()
    }

    #[test]
    fn defaults() {
        let s = parse(&["--models", "m"]).unwrap();
        assert_eq!(s.min_detection_confidence, 0.5);
        assert_eq!(s.min_tracking_confidence, 0.5);
        assert_eq!(s.fps, 30);
        assert_eq!(s.jpeg_quality, 95);
        assert!(s.enable_face);
        assert!(s.enable_hands);
        assert_eq!(s.output_dir, Path::new("."));
        assert_eq!(s.pose_landmark_model(), Path::new("m/pose_landmark_full.onnx"));
        assert_eq!(s.pose_detection_model(), Path::new("m/pose_detection.onnx"));
    }

    #[test]
    fn variants_and_flags() {
        let s = parse(&[
            "--models",
            "m",
            "--hand-model",
            "lite",
            "--no-face",
            "--image",
            "person.jpg",
        ])
        .unwrap();
        assert_eq!(s.hand_landmark_model(), Path::new("m/hand_landmark_lite.onnx"));
        assert!(!s.enable_face);
        assert!(s.enable_hands);
        assert_eq!(s.source, SourceSettings::Image("person.jpg".into()));
    }

    #[test]
    fn image_overrides_camera() {
        let s = parse(&["--camera", "Integrated Camera", "--image", "person.jpg"]).unwrap();
        assert_eq!(s.source, SourceSettings::Image("person.jpg".into()));

        let s = parse(&["--camera", "Integrated Camera"]).unwrap();
        assert_eq!(
            s.source,
            SourceSettings::Webcam {
                name: Some("Integrated Camera".into())
            }
        );
    }

    #[test]
    fn image_with_webcam_env() {
        std::env::set_var("POSECAM_WEBCAM_NAME", "Integrated Camera");
        let s = parse(&["--image", "person.jpg"]);
        std::env::remove_var("POSECAM_WEBCAM_NAME");
        assert_eq!(s.unwrap().source, SourceSettings::Image("person.jpg".into()));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = parse(&["--min-tracking-confidence", "1.5"]).unwrap_err();
        assert!(err.to_string().contains("--min-tracking-confidence"), "{err}");
        assert!(parse(&["--jpeg-quality", "0"]).is_err());
        assert!(parse(&["--fps", "0"]).is_err());
        assert!(parse(&["--pose-model", "huge"]).is_err());
    }
}
