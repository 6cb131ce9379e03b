//! Still-frame sequences to MP4 via the system `ffmpeg` binary.
//!
//! Frames are decoded with the `image` crate and streamed to ffmpeg's stdin
//! as raw RGBA, so no intermediate files are written.

use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;
use tracing::info;

use crate::error::{ShowreelError, ShowreelResult};

pub const DEFAULT_FPS: u32 = 24;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FramesToVideoConfig {
    /// Directory holding the numbered PNG stills.
    pub input_dir: PathBuf,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_output_file() -> PathBuf {
    PathBuf::from("./video.mp4")
}

impl FramesToVideoConfig {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            fps: DEFAULT_FPS,
            output_file: default_output_file(),
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_output_file(mut self, output_file: impl Into<PathBuf>) -> Self {
        self.output_file = output_file.into();
        self
    }

    pub fn validate(&self) -> ShowreelResult<()> {
        if self.fps == 0 {
            return Err(ShowreelError::validation("fps must be non-zero"));
        }
        if !self.input_dir.is_dir() {
            return Err(ShowreelError::resource(format!(
                "frame directory does not exist: {}",
                self.input_dir.display()
            )));
        }
        Ok(())
    }
}

/// PNG files under `dir`, sorted by file name so numbered stills come out in
/// capture order.
pub fn list_frame_files(dir: &Path) -> ShowreelResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read frame directory '{}'", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list '{}'", dir.display()))?
            .path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn ensure_parent_dir(path: &Path) -> ShowreelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streaming MP4 encoder over a piped system ffmpeg process. All frames must
/// share the dimensions given at construction.
#[derive(Debug)]
pub struct FfmpegEncoder {
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegEncoder {
    pub fn new(out_path: &Path, width: u32, height: u32, fps: u32) -> ShowreelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ShowreelError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if fps == 0 {
            return Err(ShowreelError::validation("encode fps must be non-zero"));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            // yuv420p output needs even dimensions.
            return Err(ShowreelError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        ensure_parent_dir(out_path)?;

        if !is_ffmpeg_on_path() {
            return Err(ShowreelError::resource(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        // System binary over ffmpeg-next to avoid native dev header/lib
        // requirements.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{width}x{height}"),
            "-r",
            &fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(out_path);

        let mut child = cmd
            .spawn()
            .with_context(|| "failed to spawn ffmpeg (is it installed and on PATH?)")?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ShowreelError::resource("failed to open ffmpeg stdin"))?;

        Ok(Self {
            width,
            height,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_frame(&mut self, rgba: &[u8]) -> ShowreelResult<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if rgba.len() != expected {
            return Err(ShowreelError::validation(format!(
                "frame buffer size mismatch: got {} bytes, expected {expected}",
                rgba.len()
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ShowreelError::validation(
                "ffmpeg encoder is already finalized",
            ));
        };

        use std::io::Write as _;
        stdin
            .write_all(rgba)
            .with_context(|| "failed to write frame to ffmpeg stdin")?;
        Ok(())
    }

    pub fn finish(mut self) -> ShowreelResult<()> {
        drop(self.stdin.take());

        let output = self
            .child
            .wait_with_output()
            .with_context(|| "failed to wait for ffmpeg to finish")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShowreelError::Command {
                command: format!("ffmpeg ({})", stderr.trim()),
                status: output.status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

/// Encode the PNG stills under `config.input_dir` into a single MP4.
///
/// Frame dimensions are taken from the first still; later frames with other
/// dimensions abort the encode.
pub fn frames_to_video(config: &FramesToVideoConfig) -> ShowreelResult<PathBuf> {
    config.validate()?;

    let frames = list_frame_files(&config.input_dir)?;
    if frames.is_empty() {
        return Err(ShowreelError::resource(format!(
            "no png frames found under '{}'",
            config.input_dir.display()
        )));
    }

    let first = image::open(&frames[0])
        .with_context(|| format!("failed to decode frame '{}'", frames[0].display()))?
        .to_rgba8();
    let (width, height) = first.dimensions();

    info!(
        frames = frames.len(),
        width,
        height,
        fps = config.fps,
        out = %config.output_file.display(),
        "encoding frame sequence"
    );

    let mut encoder = FfmpegEncoder::new(&config.output_file, width, height, config.fps)?;
    encoder.encode_frame(first.as_raw())?;
    for path in &frames[1..] {
        let frame = image::open(path)
            .with_context(|| format!("failed to decode frame '{}'", path.display()))?
            .to_rgba8();
        if frame.dimensions() != (width, height) {
            return Err(ShowreelError::validation(format!(
                "frame '{}' is {}x{}, expected {width}x{height}",
                path.display(),
                frame.dimensions().0,
                frame.dimensions().1
            )));
        }
        encoder.encode_frame(frame.as_raw())?;
    }
    encoder.finish()?;
    Ok(config.output_file.clone())
}
