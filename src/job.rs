//! Turntable capture orchestration: builds the full scene for one job and
//! hands it to an external render engine.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use glam::DVec3;
use tracing::{info, warn};

use crate::{
    animate::animate_turntable,
    camera::look_at,
    compose::{Aov, tap_base_color, tap_compositor_aov, tap_metallic_roughness},
    error::{ShowreelError, ShowreelResult},
    graph::{ColorMode, Node, NodeGraph, NodeKind, PortName, SocketValue},
    normalize::normalize_object,
    scene::{EngineKind, Lens, LightKind, ObjectId, OutputFormat, Scene},
};

/// One turntable capture job. Unknown keys in the source JSON are rejected.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Backdrop plane asset.
    pub plane_file: PathBuf,
    /// Asset to capture.
    pub model_file: PathBuf,
    /// Replace the plane's material with the fixed glossy backdrop.
    #[serde(default)]
    pub set_plane_material: bool,
    /// Camera orbit radius.
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Camera elevation above the ground plane, degrees.
    #[serde(default = "default_angle")]
    pub angle: f64,
    /// Square output dimension in pixels.
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// Encode a single MP4 instead of numbered stills.
    #[serde(default)]
    pub video: bool,
    /// Renderer quality (path-tracing samples).
    #[serde(default = "default_samples")]
    pub samples: u32,
    /// Turntable frame count (one full revolution).
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Image-based lighting from `bg_file` instead of the two fixed spots.
    #[serde(default)]
    pub bg_lighting: bool,
    #[serde(default)]
    pub bg_file: Option<PathBuf>,
}

fn default_radius() -> f64 {
    5.0
}

fn default_angle() -> f64 {
    5.0
}

fn default_resolution() -> u32 {
    1024
}

fn default_samples() -> u32 {
    64
}

fn default_frames() -> u32 {
    360
}

impl JobConfig {
    pub fn from_json(json: &str) -> ShowreelResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ShowreelError::validation(format!("bad job config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ShowreelResult<()> {
        if self.radius <= 0.0 {
            return Err(ShowreelError::validation("radius must be > 0"));
        }
        if self.resolution == 0 {
            return Err(ShowreelError::validation("resolution must be > 0"));
        }
        if self.frames == 0 {
            return Err(ShowreelError::validation("frames must be > 0"));
        }
        if self.samples == 0 {
            return Err(ShowreelError::validation("samples must be > 0"));
        }
        if self.bg_lighting && self.bg_file.is_none() {
            return Err(ShowreelError::validation(
                "bg_lighting requires bg_file to be set",
            ));
        }
        Ok(())
    }
}

/// Loads an asset file into the scene. The concrete importer (glTF etc.) is
/// an external collaborator.
pub trait AssetImporter {
    fn import(&mut self, scene: &mut Scene, path: &Path) -> ShowreelResult<ObjectId>;
}

/// Executes the actual render. The engine consumes the fully prepared scene;
/// it is never handed a partially wired one.
pub trait RenderEngine {
    fn render_animation(&mut self, scene: &Scene) -> ShowreelResult<()>;
}

/// Fully prepared scene plus the ids the caller may want to inspect.
#[derive(Debug)]
pub struct PreparedJob {
    pub scene: Scene,
    pub plane: ObjectId,
    pub model: ObjectId,
    pub camera: ObjectId,
    pub albedo_tapped: bool,
    pub metallic_roughness_tapped: bool,
}

const CAMERA_FOV_DEG: f64 = 15.0;
const BACKDROP_GREY: f64 = 0.2;
const BACKDROP_ROUGHNESS: f64 = 0.1;

fn glossy_backdrop_material() -> NodeGraph {
    let mut graph = NodeGraph::new();
    let output = graph.add(Node::new(NodeKind::MaterialOutput));
    let glossy = graph.add(
        Node::new(NodeKind::GlossyBsdf)
            .with_default(
                PortName::Color,
                SocketValue::Color([BACKDROP_GREY, BACKDROP_GREY, BACKDROP_GREY, 1.0]),
            )
            .with_default(PortName::Roughness, SocketValue::Scalar(BACKDROP_ROUGHNESS)),
    );
    graph.connect(glossy, PortName::Bsdf, output, PortName::Surface);
    graph.set_active_output(output);
    graph
}

/// Build the complete scene for a turntable capture: backdrop and model,
/// normalization, camera placement, lighting, auxiliary taps, keyframes and
/// output settings. Auxiliary taps degrade gracefully; everything else is
/// fatal.
pub fn prepare_turntable(
    config: &JobConfig,
    save_dir: &Path,
    importer: &mut dyn AssetImporter,
) -> ShowreelResult<PreparedJob> {
    config.validate()?;
    std::fs::create_dir_all(save_dir)
        .with_context(|| format!("create save dir '{}'", save_dir.display()))?;

    let mut scene = Scene::new();
    scene.render.film_transparent = true;
    scene.render.color_mode = ColorMode::Rgba;

    let plane = importer.import(&mut scene, &config.plane_file)?;
    if config.set_plane_material {
        scene.object_mut(plane).material = Some(glossy_backdrop_material());
    }

    let model = importer.import(&mut scene, &config.model_file)?;
    normalize_object(&mut scene, model)?;

    // Keep the backdrop under the (re-centered) model.
    let model_location = scene.object(model).location();
    scene.object_mut(plane).translate(model_location);

    let camera = scene.add_camera("camera");
    scene.camera_data_mut(camera)?.lens = Lens::FovRadians(CAMERA_FOV_DEG.to_radians());
    let angle_rad = config.angle.to_radians();
    let eye = DVec3::new(
        config.radius * angle_rad.cos(),
        0.0,
        config.radius * angle_rad.sin(),
    );
    scene.object_mut(camera).matrix_world = look_at(eye, DVec3::ZERO, DVec3::Z);

    if config.bg_lighting {
        // validate() guarantees bg_file is present.
        let bg_file = config.bg_file.clone().ok_or_else(|| {
            ShowreelError::validation("bg_lighting requires bg_file to be set")
        })?;
        scene.set_world_background_hdr(&bg_file, 1.0, None)?;
    } else {
        let key = scene.add_light("key", DVec3::new(5.0, 2.0, 3.0), LightKind::Spot, 300.0);
        scene.object_mut(key).matrix_world =
            look_at(DVec3::new(5.0, 2.0, 3.0), DVec3::ZERO, DVec3::Z);
        let fill = scene.add_light("fill", DVec3::new(3.0, 0.5, 0.1), LightKind::Spot, 130.0);
        scene.object_mut(fill).matrix_world =
            look_at(DVec3::new(3.0, 0.5, 0.1), DVec3::ZERO, DVec3::Z);
    }

    let albedo_tapped = tap_base_color(&mut scene, model);
    if albedo_tapped {
        std::fs::create_dir_all(save_dir.join("albedo"))
            .with_context(|| "create albedo output dir")?;
    } else {
        warn!("albedo tap skipped; beauty render is unaffected");
    }

    let metallic_roughness_tapped = tap_metallic_roughness(&mut scene, model);
    if metallic_roughness_tapped {
        std::fs::create_dir_all(save_dir.join("metallic_roughness"))
            .with_context(|| "create metallic_roughness output dir")?;
    } else {
        warn!("metallic/roughness tap skipped; beauty render is unaffected");
    }

    tap_compositor_aov(&mut scene, Aov::Depth, save_dir);
    tap_compositor_aov(&mut scene, Aov::Normal, save_dir);

    animate_turntable(&mut scene, model, config.frames)?;

    scene.render.engine = EngineKind::Cycles;
    scene.render.samples = config.samples;
    scene.render.resolution_x = config.resolution;
    scene.render.resolution_y = config.resolution;

    if config.video {
        scene.render.output_format = OutputFormat::FfmpegMp4;
        scene.render.output_path = save_dir.join("video.mp4");
        scene.render.fps = 24;
    } else {
        scene.render.output_format = OutputFormat::Png;
        scene.render.output_path = save_dir.to_path_buf();
    }

    info!(
        model = %config.model_file.display(),
        frames = config.frames,
        resolution = config.resolution,
        albedo = albedo_tapped,
        metallic_roughness = metallic_roughness_tapped,
        "turntable job prepared"
    );

    Ok(PreparedJob {
        scene,
        plane,
        model,
        camera,
        albedo_tapped,
        metallic_roughness_tapped,
    })
}

/// Prepare the scene and run the engine over the keyed frame range.
pub fn run_turntable_job(
    config: &JobConfig,
    save_dir: &Path,
    importer: &mut dyn AssetImporter,
    engine: &mut dyn RenderEngine,
) -> ShowreelResult<()> {
    let prepared = prepare_turntable(config, save_dir, importer)?;
    engine.render_animation(&prepared.scene)
}
