use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use showreel::{
    cache::{RemoteCache, is_remote_path},
    encode_ffmpeg::{FramesToVideoConfig, frames_to_video},
    error::{ShowreelError, ShowreelResult},
    extract::{FfmpegDecoder, VideoToFramesConfig, videos_to_frames},
    job::{AssetImporter, JobConfig, RenderEngine, run_turntable_job},
    scene::{Aabb, Mesh, Object, ObjectData, ObjectId, Scene},
};

#[derive(Parser, Debug)]
#[command(name = "showreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare a turntable capture from a job config JSON.
    Render(RenderArgs),
    /// Encode a directory of PNG stills into an MP4 (requires `ffmpeg` on PATH).
    FramesToVideo(FramesToVideoArgs),
    /// Extract JPEG stills from rendered turntable videos.
    VideoToFrames(VideoToFramesArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Job config JSON, local or `manifold://`.
    #[arg(long)]
    config: String,

    /// Output directory, local or `manifold://`. Remote outputs are staged
    /// locally and uploaded after the job succeeds.
    #[arg(long)]
    save_dir: String,

    /// Local cache for remote inputs and upload staging.
    #[arg(long, default_value = ".showreel_cache")]
    cache_dir: PathBuf,

    /// Extra attempts for each remote transfer command.
    #[arg(long, default_value_t = 2)]
    retries: u32,
}

#[derive(Parser, Debug)]
struct FramesToVideoArgs {
    /// Directory holding the numbered PNG stills.
    #[arg(long)]
    input_dir: PathBuf,

    /// Output frame rate.
    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Output MP4 path.
    #[arg(long, default_value = "./video.mp4")]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct VideoToFramesArgs {
    /// Directory whose subdirectories each hold one `video.mp4`.
    #[arg(long)]
    input_dir: PathBuf,

    /// Per-video frame directories are created under here.
    #[arg(long)]
    output_dir: PathBuf,

    /// Centered crop fraction in (0, 1].
    #[arg(long, default_value_t = 1.0)]
    crop_ratio: f64,

    /// Worker pool size.
    #[arg(long, default_value_t = 8)]
    threads: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::FramesToVideo(args) => cmd_frames_to_video(args),
        Command::VideoToFrames(args) => cmd_video_to_frames(args),
    }
}

/// Stands in for a real asset importer: checks the file exists and registers
/// a unit-cube mesh named after it, so scene preparation can be exercised and
/// inspected without a content pipeline.
struct PlaceholderImporter;

impl AssetImporter for PlaceholderImporter {
    fn import(&mut self, scene: &mut Scene, path: &Path) -> ShowreelResult<ObjectId> {
        if !path.is_file() {
            return Err(ShowreelError::resource(format!(
                "asset file does not exist: {}",
                path.display()
            )));
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string());
        Ok(scene.add_object(Object::new(
            name,
            ObjectData::Mesh(Mesh {
                bounds: Aabb::new(glam::DVec3::splat(-0.5), glam::DVec3::splat(0.5)),
            }),
        )))
    }
}

/// Writes the fully prepared scene as JSON instead of rendering. The real
/// renderer is an external collaborator behind the same trait.
struct SceneDumpEngine {
    out_path: PathBuf,
}

impl RenderEngine for SceneDumpEngine {
    fn render_animation(&mut self, scene: &Scene) -> ShowreelResult<()> {
        let json = serde_json::to_string_pretty(scene)
            .with_context(|| "serialize prepared scene")?;
        std::fs::write(&self.out_path, json)
            .with_context(|| format!("write '{}'", self.out_path.display()))?;
        eprintln!("wrote {}", self.out_path.display());
        Ok(())
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cache = RemoteCache::new(&args.cache_dir).with_retries(args.retries);

    let config_path = cache.download_if_remote(&args.config)?;
    let config_json = std::fs::read_to_string(&config_path)
        .with_context(|| format!("read job config '{}'", config_path.display()))?;
    let mut config = JobConfig::from_json(&config_json)?;

    // Remote asset paths are resolved to their cached local copies before the
    // job touches them.
    config.plane_file = cache.download_if_remote(&config.plane_file.to_string_lossy())?;
    config.model_file = cache.download_if_remote(&config.model_file.to_string_lossy())?;
    if let Some(bg) = &config.bg_file {
        config.bg_file = Some(cache.download_if_remote(&bg.to_string_lossy())?);
    }

    let run = |save_dir: &Path| -> ShowreelResult<()> {
        let mut engine = SceneDumpEngine {
            out_path: save_dir.join("scene.json"),
        };
        run_turntable_job(&config, save_dir, &mut PlaceholderImporter, &mut engine)
    };

    if is_remote_path(&args.save_dir) {
        cache.with_upload(&args.save_dir, |staging| run(staging))?;
    } else {
        run(Path::new(&args.save_dir))?;
    }
    Ok(())
}

fn cmd_frames_to_video(args: FramesToVideoArgs) -> anyhow::Result<()> {
    let config = FramesToVideoConfig::new(args.input_dir)
        .with_fps(args.fps)
        .with_output_file(args.out);
    let out = frames_to_video(&config)?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_video_to_frames(args: VideoToFramesArgs) -> anyhow::Result<()> {
    let config = VideoToFramesConfig::new(args.input_dir, args.output_dir)
        .with_crop_ratio(args.crop_ratio)
        .with_threads(args.threads);
    let summary = videos_to_frames(&config, &FfmpegDecoder)?;
    eprintln!(
        "extracted {} video(s), {} failed",
        summary.completed, summary.failed
    );
    if summary.failed > 0 {
        anyhow::bail!("{} extraction job(s) failed", summary.failed);
    }
    Ok(())
}
