//! Batch extraction of still frames from rendered turntable videos.
//!
//! Scans a directory tree for `video.mp4` files, decodes each through the
//! system ffmpeg, center-crops and writes numbered JPEG stills. Jobs run on
//! a fixed-size worker pool and fail independently.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rayon::prelude::*;
use tracing::{error, info};

use crate::error::{ShowreelError, ShowreelResult};

pub const VIDEO_FILE_NAME: &str = "video.mp4";
pub const DEFAULT_THREADS: usize = 8;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VideoToFramesConfig {
    /// Directory whose immediate subdirectories each hold one `video.mp4`.
    pub input_dir: PathBuf,
    /// Per-video frame directories are created under here.
    pub output_dir: PathBuf,
    /// Centered crop fraction in `(0, 1]`. `1.0` keeps the full frame.
    #[serde(default = "default_crop_ratio")]
    pub crop_ratio: f64,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_crop_ratio() -> f64 {
    1.0
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

impl VideoToFramesConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            crop_ratio: default_crop_ratio(),
            threads: DEFAULT_THREADS,
        }
    }

    pub fn with_crop_ratio(mut self, crop_ratio: f64) -> Self {
        self.crop_ratio = crop_ratio;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Validated before any filesystem work or decoding starts.
    pub fn validate(&self) -> ShowreelResult<()> {
        if !(self.crop_ratio > 0.0 && self.crop_ratio <= 1.0) {
            return Err(ShowreelError::validation(format!(
                "crop_ratio must be in (0, 1], got {}",
                self.crop_ratio
            )));
        }
        if self.threads == 0 {
            return Err(ShowreelError::validation("threads must be > 0"));
        }
        if !self.input_dir.is_dir() {
            return Err(ShowreelError::resource(format!(
                "input directory does not exist: {}",
                self.input_dir.display()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
}

/// Seam for the decode step so batch behavior is testable without media
/// files or a system ffmpeg.
pub trait VideoDecoder: Sync {
    fn probe(&self, video: &Path) -> ShowreelResult<VideoInfo>;

    /// Decode every frame as tightly packed RGB8 and feed it to `on_frame`
    /// in display order.
    fn decode_rgb_frames(
        &self,
        video: &Path,
        info: VideoInfo,
        on_frame: &mut dyn FnMut(&[u8]) -> ShowreelResult<()>,
    ) -> ShowreelResult<()>;
}

/// Decodes through the system `ffprobe`/`ffmpeg` binaries.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegDecoder;

impl VideoDecoder for FfmpegDecoder {
    fn probe(&self, video: &Path) -> ShowreelResult<VideoInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
        }

        let out = std::process::Command::new("ffprobe")
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(video)
            .output()
            .with_context(|| "failed to run ffprobe")?;
        if !out.status.success() {
            return Err(ShowreelError::Command {
                command: format!(
                    "ffprobe {} ({})",
                    video.display(),
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
                status: out.status.code().unwrap_or(-1),
            });
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .with_context(|| "ffprobe json parse failed")?;
        let stream = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| {
                ShowreelError::resource(format!("no video stream in '{}'", video.display()))
            })?;
        let width = stream
            .width
            .ok_or_else(|| ShowreelError::resource("missing video width from ffprobe"))?;
        let height = stream
            .height
            .ok_or_else(|| ShowreelError::resource("missing video height from ffprobe"))?;
        Ok(VideoInfo { width, height })
    }

    fn decode_rgb_frames(
        &self,
        video: &Path,
        info: VideoInfo,
        on_frame: &mut dyn FnMut(&[u8]) -> ShowreelResult<()>,
    ) -> ShowreelResult<()> {
        use std::io::Read as _;

        let frame_len = info.width as usize * info.height as usize * 3;
        if frame_len == 0 {
            return Err(ShowreelError::resource(
                "decoded video frame size is zero (invalid source dimensions)",
            ));
        }

        let mut child = std::process::Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(video)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .with_context(|| "failed to spawn ffmpeg for video decode")?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShowreelError::resource("failed to open ffmpeg stdout"))?;
        let mut buf = vec![0u8; frame_len];
        loop {
            let mut filled = 0;
            while filled < frame_len {
                let n = stdout
                    .read(&mut buf[filled..])
                    .with_context(|| "failed to read decoded frames from ffmpeg")?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            if filled < frame_len {
                return Err(ShowreelError::resource(format!(
                    "truncated frame from '{}': {filled} of {frame_len} bytes",
                    video.display()
                )));
            }
            on_frame(&buf)?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| "failed to wait for ffmpeg decode")?;
        if !output.status.success() {
            return Err(ShowreelError::Command {
                command: format!(
                    "ffmpeg decode {} ({})",
                    video.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                status: output.status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

/// Centered crop window, truncating the same way on both axes.
fn crop_window(info: VideoInfo, crop_ratio: f64) -> (u32, u32, u32, u32) {
    let crop_w = ((f64::from(info.width) * crop_ratio) as u32).max(1);
    let crop_h = ((f64::from(info.height) * crop_ratio) as u32).max(1);
    let x0 = (info.width - crop_w) / 2;
    let y0 = (info.height - crop_h) / 2;
    (x0, y0, crop_w, crop_h)
}

/// Decode one video into numbered JPEG stills under `frame_dir`.
pub fn extract_video(
    decoder: &dyn VideoDecoder,
    video: &Path,
    frame_dir: &Path,
    crop_ratio: f64,
) -> ShowreelResult<usize> {
    let info = decoder.probe(video)?;
    let (x0, y0, crop_w, crop_h) = crop_window(info, crop_ratio);

    std::fs::create_dir_all(frame_dir)
        .with_context(|| format!("create frame dir '{}'", frame_dir.display()))?;

    let mut index = 0usize;
    decoder.decode_rgb_frames(video, info, &mut |rgb| {
        let full = image::RgbImage::from_raw(info.width, info.height, rgb.to_vec())
            .ok_or_else(|| ShowreelError::resource("decoded frame buffer has wrong size"))?;
        let cropped = image::imageops::crop_imm(&full, x0, y0, crop_w, crop_h).to_image();
        let out_path = frame_dir.join(format!("{index:04}.jpg"));
        cropped
            .save(&out_path)
            .with_context(|| format!("failed to write '{}'", out_path.display()))?;
        index += 1;
        Ok(())
    })?;
    Ok(index)
}

/// One discovered extraction job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractJob {
    pub video: PathBuf,
    pub frame_dir: PathBuf,
}

/// Immediate subdirectories of `input_dir` that contain a `video.mp4`,
/// sorted by name.
pub fn discover_jobs(config: &VideoToFramesConfig) -> ShowreelResult<Vec<ExtractJob>> {
    let mut jobs = Vec::new();
    let entries = std::fs::read_dir(&config.input_dir).with_context(|| {
        format!("failed to read input directory '{}'", config.input_dir.display())
    })?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list '{}'", config.input_dir.display()))?
            .path();
        if !path.is_dir() {
            continue;
        }
        let video = path.join(VIDEO_FILE_NAME);
        if !video.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .ok_or_else(|| ShowreelError::resource("directory entry has no name"))?;
        jobs.push(ExtractJob {
            video,
            frame_dir: config.output_dir.join(name),
        });
    }
    jobs.sort_by(|a, b| a.video.cmp(&b.video));
    Ok(jobs)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub completed: usize,
    pub failed: usize,
}

/// Run every discovered job on a pool of `config.threads` workers.
///
/// A failing video is logged and skipped; the rest of the batch completes.
/// The summary reports both counts so callers can flag partial failures.
pub fn videos_to_frames(
    config: &VideoToFramesConfig,
    decoder: &dyn VideoDecoder,
) -> ShowreelResult<ExtractSummary> {
    config.validate()?;
    let jobs = discover_jobs(config)?;
    info!(jobs = jobs.len(), threads = config.threads, "extracting frame batches");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(anyhow::Error::from)?;

    let results: Vec<bool> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                match extract_video(decoder, &job.video, &job.frame_dir, config.crop_ratio) {
                    Ok(frames) => {
                        info!(video = %job.video.display(), frames, "extracted");
                        true
                    }
                    Err(err) => {
                        error!(video = %job.video.display(), %err, "extraction failed");
                        false
                    }
                }
            })
            .collect()
    });

    let completed = results.iter().filter(|ok| **ok).count();
    Ok(ExtractSummary {
        completed,
        failed: results.len() - completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_ratio_bounds() {
        let base = VideoToFramesConfig::new("/tmp", "/tmp/out");
        assert!(base.clone().with_crop_ratio(0.0).validate().is_err());
        assert!(base.clone().with_crop_ratio(1.5).validate().is_err());
        assert!(base.clone().with_crop_ratio(-0.2).validate().is_err());
        assert!(base.with_crop_ratio(1.0).validate().is_ok());
    }

    #[test]
    fn crop_window_is_centered_and_truncates() {
        let info = VideoInfo {
            width: 100,
            height: 51,
        };
        let (x0, y0, w, h) = crop_window(info, 0.5);
        assert_eq!((w, h), (50, 25));
        assert_eq!((x0, y0), (25, 13));

        let (x0, y0, w, h) = crop_window(info, 1.0);
        assert_eq!((x0, y0, w, h), (0, 0, 100, 51));
    }

    #[test]
    fn zero_threads_is_rejected() {
        let cfg = VideoToFramesConfig::new("/tmp", "/tmp/out").with_threads(0);
        assert!(cfg.validate().is_err());
    }
}
