#![forbid(unsafe_code)]

pub mod animate;
pub mod cache;
pub mod camera;
pub mod compose;
pub mod encode_ffmpeg;
pub mod error;
pub mod extract;
pub mod graph;
pub mod job;
pub mod normalize;
pub mod scene;
pub mod trajectory;

pub use cache::RemoteCache;
pub use error::{ShowreelError, ShowreelResult};
pub use graph::{NodeGraph, NodeId, NodeKind, PortName};
pub use job::{
    AssetImporter, JobConfig, PreparedJob, RenderEngine, prepare_turntable, run_turntable_job,
};
pub use scene::{ObjectId, Scene};
