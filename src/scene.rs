use std::path::{Path, PathBuf};

use glam::{DMat4, DVec3};

use crate::{
    camera::SensorFit,
    error::{ShowreelError, ShowreelResult},
    graph::{Node, NodeGraph, NodeKind, PortName, SocketValue},
};

/// Index into a [`Scene`]'s object table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ObjectId(pub usize);

/// Axis-aligned box, `min <= max` componentwise.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            DVec3::new(lo.x, lo.y, lo.z),
            DVec3::new(hi.x, lo.y, lo.z),
            DVec3::new(lo.x, hi.y, lo.z),
            DVec3::new(hi.x, hi.y, lo.z),
            DVec3::new(lo.x, lo.y, hi.z),
            DVec3::new(hi.x, lo.y, hi.z),
            DVec3::new(lo.x, hi.y, hi.z),
            DVec3::new(hi.x, hi.y, hi.z),
        ]
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Mesh {
    /// Object-local bounds. World extents must be computed by transforming
    /// each corner through `matrix_world` before min/max reduction.
    pub bounds: Aabb,
}

/// How the camera's focal length is expressed.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Lens {
    FovRadians(f64),
    Millimeters(f64),
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CameraData {
    pub lens: Lens,
    pub sensor_width_mm: f64,
    pub sensor_height_mm: f64,
    pub sensor_fit: SensorFit,
    pub shift_x: f64,
    pub shift_y: f64,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            lens: Lens::Millimeters(50.0),
            sensor_width_mm: 36.0,
            sensor_height_mm: 24.0,
            sensor_fit: SensorFit::Auto,
            shift_x: 0.0,
            shift_y: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LightKind {
    Point,
    Sun,
    Spot,
    Area,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub energy: f64,
    pub color: [f64; 3],
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum ObjectData {
    Mesh(Mesh),
    Camera(CameraData),
    Light(Light),
    Empty,
}

/// Interaction mode. Animation keys may only be written in `Object` mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ObjectMode {
    Object,
    Edit,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RotationKey {
    pub frame: i64,
    /// Rotation about the world vertical (Z) axis, radians.
    pub angle_rad: f64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Object {
    pub name: String,
    pub data: ObjectData,
    pub matrix_world: DMat4,
    /// Active material node tree, if the object is shaded with nodes.
    pub material: Option<NodeGraph>,
    pub rotation_keys: Vec<RotationKey>,
    pub mode: ObjectMode,
}

impl Object {
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            data,
            matrix_world: DMat4::IDENTITY,
            material: None,
            rotation_keys: Vec::new(),
            mode: ObjectMode::Object,
        }
    }

    pub fn location(&self) -> DVec3 {
        self.matrix_world.w_axis.truncate()
    }

    pub fn translate(&mut self, delta: DVec3) {
        self.matrix_world.w_axis += delta.extend(0.0);
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.data {
            ObjectData::Mesh(m) => Some(m),
            _ => None,
        }
    }
}

/// World (environment) shading. The graph always carries a `Background`
/// node; HDR setup links an environment texture chain into it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct World {
    pub graph: NodeGraph,
}

impl Default for World {
    fn default() -> Self {
        let mut graph = NodeGraph::new();
        graph.add(
            Node::new(NodeKind::Background)
                .with_default(PortName::Color, SocketValue::Color([0.05, 0.05, 0.05, 1.0]))
                .with_default(PortName::Strength, SocketValue::Scalar(1.0)),
        );
        Self { graph }
    }
}

#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ViewLayer {
    pub use_pass_z: bool,
    pub use_pass_normal: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EngineKind {
    Cycles,
    Eevee,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OutputFormat {
    /// Numbered PNG stills under `output_path`.
    Png,
    /// Single MP4 container at `output_path`.
    FfmpegMp4,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderSettings {
    pub engine: EngineKind,
    pub samples: u32,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub resolution_percentage: u32,
    pub film_transparent: bool,
    pub fps: u32,
    pub pixel_aspect_x: f64,
    pub pixel_aspect_y: f64,
    pub output_format: OutputFormat,
    pub output_path: PathBuf,
    pub color_mode: crate::graph::ColorMode,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            engine: EngineKind::Cycles,
            samples: 64,
            resolution_x: 1920,
            resolution_y: 1080,
            resolution_percentage: 100,
            film_transparent: false,
            fps: 24,
            pixel_aspect_x: 1.0,
            pixel_aspect_y: 1.0,
            output_format: OutputFormat::Png,
            output_path: PathBuf::new(),
            color_mode: crate::graph::ColorMode::Rgb,
        }
    }
}

/// Explicit scene handle. Every capture operation takes the scene (or an
/// object id within it); there is no implicit global state.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    objects: Vec<Object>,
    pub camera: Option<ObjectId>,
    pub world: World,
    pub view_layer: ViewLayer,
    pub compositor: Option<NodeGraph>,
    pub render: RenderSettings,
    pub frame_start: i64,
    pub frame_end: i64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: Object) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.0]
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().enumerate().map(|(i, o)| (ObjectId(i), o))
    }

    /// Add a perspective camera and make it the scene's active camera.
    pub fn add_camera(&mut self, name: impl Into<String>) -> ObjectId {
        let id = self.add_object(Object::new(name, ObjectData::Camera(CameraData::default())));
        self.camera = Some(id);
        id
    }

    pub fn add_light(
        &mut self,
        name: impl Into<String>,
        location: DVec3,
        kind: LightKind,
        energy: f64,
    ) -> ObjectId {
        let mut object = Object::new(
            name,
            ObjectData::Light(Light {
                kind,
                energy,
                color: [1.0, 1.0, 1.0],
            }),
        );
        object.matrix_world = DMat4::from_translation(location);
        self.add_object(object)
    }

    pub fn camera_data(&self, id: ObjectId) -> ShowreelResult<&CameraData> {
        match &self.object(id).data {
            ObjectData::Camera(data) => Ok(data),
            _ => Err(ShowreelError::validation(format!(
                "object '{}' is not a camera",
                self.object(id).name
            ))),
        }
    }

    pub fn camera_data_mut(&mut self, id: ObjectId) -> ShowreelResult<&mut CameraData> {
        let name = self.object(id).name.clone();
        match &mut self.object_mut(id).data {
            ObjectData::Camera(data) => Ok(data),
            _ => Err(ShowreelError::validation(format!(
                "object '{name}' is not a camera"
            ))),
        }
    }

    /// Compositor graph, created on first use with its render-layers source
    /// node (mirrors enabling compositing on a fresh scene).
    pub fn ensure_compositor(&mut self) -> &mut NodeGraph {
        let graph = self.compositor.get_or_insert_with(NodeGraph::new);
        if graph.find(|n| matches!(n.kind, NodeKind::RenderLayers)).is_none() {
            graph.add(Node::new(NodeKind::RenderLayers));
        }
        graph
    }

    /// Drive world lighting from an equirectangular HDR image.
    ///
    /// Links `TextureCoordinate.Generated -> Mapping -> EnvironmentTexture ->
    /// Background.Color` so the environment can be rotated via the mapping
    /// node. Fails if `img_path` does not exist on disk.
    pub fn set_world_background_hdr(
        &mut self,
        img_path: &Path,
        strength: f64,
        rotation_euler: Option<[f64; 3]>,
    ) -> ShowreelResult<()> {
        if !img_path.exists() {
            return Err(ShowreelError::resource(format!(
                "background image does not exist: {}",
                img_path.display()
            )));
        }

        let graph = &mut self.world.graph;
        let background = graph
            .find(|n| matches!(n.kind, NodeKind::Background))
            .unwrap_or_else(|| graph.add(Node::new(NodeKind::Background)));
        graph
            .node_mut(background)
            .defaults
            .retain(|(p, _)| *p != PortName::Strength);
        graph
            .node_mut(background)
            .defaults
            .push((PortName::Strength, SocketValue::Scalar(strength)));

        let texture = graph.add(Node::new(NodeKind::EnvironmentTexture {
            image: img_path.to_path_buf(),
        }));
        graph.connect(texture, PortName::Color, background, PortName::Color);

        let mapping = graph.add(Node::new(NodeKind::Mapping).with_default(
            PortName::Rotation,
            SocketValue::Vector(rotation_euler.unwrap_or([0.0; 3])),
        ));
        let coords = graph.add(Node::new(NodeKind::TextureCoordinate));
        graph.connect(coords, PortName::Generated, mapping, PortName::Vector);
        graph.connect(mapping, PortName::Vector, texture, PortName::Vector);

        Ok(())
    }
}
