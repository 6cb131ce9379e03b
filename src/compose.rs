//! Multi-pass graph composition: taps existing shading networks into new
//! output sinks so auxiliary channels render alongside the beauty pass.
//!
//! Every tap duplicates the source of an existing link; it never removes or
//! rewires the original, so a failed or skipped tap leaves the primary
//! output untouched.

use std::path::Path;

use tracing::warn;

use crate::{
    graph::{
        ColorDepth, ColorMode, FileOutputSettings, ImageFileFormat, Link, Node, NodeGraph,
        NodeId, NodeKind, PortName,
    },
    scene::{ObjectId, Scene},
};

/// Auxiliary per-pixel channel emitted through the compositor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aov {
    Depth,
    Normal,
}

impl Aov {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Normal => "normal",
        }
    }

    fn render_layer_port(self) -> PortName {
        match self {
            Self::Depth => PortName::Depth,
            Self::Normal => PortName::Normal,
        }
    }

    fn file_output(self, base_path: &Path) -> FileOutputSettings {
        match self {
            // Depth wants the full float range in a single channel.
            Self::Depth => FileOutputSettings {
                base_path: base_path.to_path_buf(),
                format: ImageFileFormat::Png,
                color_depth: ColorDepth::ThirtyTwo,
                color_mode: ColorMode::Bw,
            },
            Self::Normal => FileOutputSettings {
                base_path: base_path.to_path_buf(),
                format: ImageFileFormat::Png,
                color_depth: ColorDepth::Eight,
                color_mode: ColorMode::Rgba,
            },
        }
    }
}

fn principled_node(material: &NodeGraph) -> Option<NodeId> {
    material.find(|n| matches!(n.kind, NodeKind::PrincipledBsdf))
}

fn principled_input(material: &NodeGraph, object_name: &str, port: PortName) -> Option<Link> {
    let Some(principled) = principled_node(material) else {
        warn!(object = object_name, "no principled shader node found");
        return None;
    };
    let Some(link) = material.input_link(principled, port) else {
        warn!(object = object_name, ?port, "principled input is not linked");
        return None;
    };
    Some(link)
}

/// Route the signal feeding the principled node's base-color input into a
/// fresh active material output, so the renderer emits unshaded albedo.
///
/// Returns `false` (after a diagnostic) when the object has no node
/// material, no principled node, or no link feeding base color; the beauty
/// output is unaffected either way.
pub fn tap_base_color(scene: &mut Scene, id: ObjectId) -> bool {
    let name = scene.object(id).name.clone();
    let Some(material) = scene.object_mut(id).material.as_mut() else {
        warn!(object = name.as_str(), "object has no node material");
        return false;
    };
    let Some(link) = principled_input(material, &name, PortName::BaseColor) else {
        return false;
    };

    let output = material.add(Node::new(NodeKind::MaterialOutput));
    material.connect(link.from_node, link.from_port, output, PortName::Surface);
    material.set_active_output(output);
    true
}

/// Pack the metallic and roughness signals into one two-channel output
/// (metallic on red, roughness on green) behind a fresh active material
/// output. Requires both principled inputs to be linked; otherwise the
/// material is left unmodified and `false` is returned.
pub fn tap_metallic_roughness(scene: &mut Scene, id: ObjectId) -> bool {
    let name = scene.object(id).name.clone();
    let Some(material) = scene.object_mut(id).material.as_mut() else {
        warn!(object = name.as_str(), "object has no node material");
        return false;
    };
    // Resolve both links before touching the graph.
    let Some(metallic) = principled_input(material, &name, PortName::Metallic) else {
        return false;
    };
    let Some(roughness) = principled_input(material, &name, PortName::Roughness) else {
        return false;
    };

    let combine = material.add(Node::new(NodeKind::CombineColor));
    let output = material.add(Node::new(NodeKind::MaterialOutput));
    material.connect(combine, PortName::Color, output, PortName::Surface);
    material.connect(metallic.from_node, metallic.from_port, combine, PortName::Red);
    material.connect(
        roughness.from_node,
        roughness.from_port,
        combine,
        PortName::Green,
    );
    material.set_active_output(output);
    true
}

/// Enable the named auxiliary pass and wire it into a file-output node under
/// `save_dir/<aov>/`.
///
/// Idempotent: re-tapping the same AOV reuses the existing file-output node
/// and rewrites its format instead of stacking duplicates.
pub fn tap_compositor_aov(scene: &mut Scene, aov: Aov, save_dir: &Path) {
    match aov {
        Aov::Depth => scene.view_layer.use_pass_z = true,
        Aov::Normal => scene.view_layer.use_pass_normal = true,
    }

    let base_path = save_dir.join(aov.dir_name());
    let settings = aov.file_output(&base_path);

    let graph = scene.ensure_compositor();
    let render_layers = match graph.find(|n| matches!(n.kind, NodeKind::RenderLayers)) {
        Some(id) => id,
        None => graph.add(Node::new(NodeKind::RenderLayers)),
    };

    let existing = graph.find(|n| {
        matches!(&n.kind, NodeKind::FileOutput(s) if s.base_path == base_path)
    });
    let file_output = match existing {
        Some(id) => {
            graph.node_mut(id).kind = NodeKind::FileOutput(settings);
            id
        }
        None => graph.add(Node::new(NodeKind::FileOutput(settings))),
    };

    graph.connect(
        render_layers,
        aov.render_layer_port(),
        file_output,
        PortName::Image,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::SocketValue,
        scene::{Aabb, Mesh, Object, ObjectData},
    };
    use glam::DVec3;
    use std::path::PathBuf;

    fn mesh_object_with_material(material: Option<NodeGraph>) -> Object {
        let mut object = Object::new(
            "model",
            ObjectData::Mesh(Mesh {
                bounds: Aabb::new(DVec3::ZERO, DVec3::ONE),
            }),
        );
        object.material = material;
        object
    }

    /// Principled material with an image texture on base color and, when
    /// `pbr` is set, value sources on metallic and roughness.
    fn principled_material(pbr: bool) -> NodeGraph {
        let mut g = NodeGraph::new();
        let principled = g.add(Node::new(NodeKind::PrincipledBsdf));
        let output = g.add(Node::new(NodeKind::MaterialOutput));
        g.connect(principled, PortName::Bsdf, output, PortName::Surface);
        g.set_active_output(output);

        let albedo = g.add(Node::new(NodeKind::ImageTexture {
            image: PathBuf::from("albedo.png"),
        }));
        g.connect(albedo, PortName::Color, principled, PortName::BaseColor);

        if pbr {
            let metallic = g.add(Node::new(NodeKind::ImageTexture {
                image: PathBuf::from("metallic.png"),
            }));
            let roughness = g.add(Node::new(NodeKind::ImageTexture {
                image: PathBuf::from("roughness.png"),
            }));
            g.connect(metallic, PortName::Color, principled, PortName::Metallic);
            g.connect(roughness, PortName::Color, principled, PortName::Roughness);
        }
        g
    }

    #[test]
    fn base_color_tap_duplicates_without_disturbing() {
        let mut scene = Scene::new();
        let id = scene.add_object(mesh_object_with_material(Some(principled_material(false))));

        let before = scene.object(id).material.as_ref().unwrap().links().len();
        assert!(tap_base_color(&mut scene, id));

        let material = scene.object(id).material.as_ref().unwrap();
        let principled = principled_node(material).unwrap();

        // The original link into the principled node survives untouched.
        let original = material.input_link(principled, PortName::BaseColor).unwrap();
        assert!(matches!(
            material.node(original.from_node).kind,
            NodeKind::ImageTexture { .. }
        ));
        assert_eq!(material.links().len(), before + 1);

        // The new active output reads from the same source.
        let active = material.active_output().unwrap();
        let tapped = material.input_link(active, PortName::Surface).unwrap();
        assert_eq!(tapped.from_node, original.from_node);
        assert_eq!(tapped.from_port, original.from_port);
    }

    #[test]
    fn base_color_tap_skips_unlinked_input() {
        let mut g = NodeGraph::new();
        let principled = g.add(
            Node::new(NodeKind::PrincipledBsdf)
                .with_default(PortName::BaseColor, SocketValue::Color([1.0, 0.0, 0.0, 1.0])),
        );
        let output = g.add(Node::new(NodeKind::MaterialOutput));
        g.connect(principled, PortName::Bsdf, output, PortName::Surface);

        let mut scene = Scene::new();
        let id = scene.add_object(mesh_object_with_material(Some(g)));

        let before = scene.object(id).material.as_ref().unwrap().links().len();
        assert!(!tap_base_color(&mut scene, id));
        assert_eq!(scene.object(id).material.as_ref().unwrap().links().len(), before);
    }

    #[test]
    fn base_color_tap_skips_missing_material() {
        let mut scene = Scene::new();
        let id = scene.add_object(mesh_object_with_material(None));
        assert!(!tap_base_color(&mut scene, id));
    }

    #[test]
    fn metallic_roughness_tap_packs_channels() {
        let mut scene = Scene::new();
        let id = scene.add_object(mesh_object_with_material(Some(principled_material(true))));

        assert!(tap_metallic_roughness(&mut scene, id));

        let material = scene.object(id).material.as_ref().unwrap();
        let active = material.active_output().unwrap();
        let surface = material.input_link(active, PortName::Surface).unwrap();
        let combine = surface.from_node;
        assert!(matches!(material.node(combine).kind, NodeKind::CombineColor));

        let red = material.input_link(combine, PortName::Red).unwrap();
        let green = material.input_link(combine, PortName::Green).unwrap();
        let principled = principled_node(material).unwrap();
        assert_eq!(
            red.from_node,
            material.input_link(principled, PortName::Metallic).unwrap().from_node
        );
        assert_eq!(
            green.from_node,
            material.input_link(principled, PortName::Roughness).unwrap().from_node
        );
    }

    #[test]
    fn metallic_roughness_tap_requires_both_links() {
        let mut g = principled_material(false);
        let principled = principled_node(&g).unwrap();
        let metallic = g.add(Node::new(NodeKind::ImageTexture {
            image: PathBuf::from("metallic.png"),
        }));
        g.connect(metallic, PortName::Color, principled, PortName::Metallic);

        let mut scene = Scene::new();
        let id = scene.add_object(mesh_object_with_material(Some(g)));

        let nodes_before = scene.object(id).material.as_ref().unwrap().nodes().count();
        assert!(!tap_metallic_roughness(&mut scene, id));
        // Nothing was added on the failed tap.
        assert_eq!(
            scene.object(id).material.as_ref().unwrap().nodes().count(),
            nodes_before
        );
    }

    #[test]
    fn depth_tap_enables_pass_and_writes_float_bw() {
        let mut scene = Scene::new();
        let save_dir = PathBuf::from("out");
        tap_compositor_aov(&mut scene, Aov::Depth, &save_dir);

        assert!(scene.view_layer.use_pass_z);
        let graph = scene.compositor.as_ref().unwrap();
        let file_output = graph
            .find(|n| matches!(n.kind, NodeKind::FileOutput(_)))
            .unwrap();
        let NodeKind::FileOutput(settings) = &graph.node(file_output).kind else {
            unreachable!()
        };
        assert_eq!(settings.base_path, save_dir.join("depth"));
        assert_eq!(settings.color_depth, ColorDepth::ThirtyTwo);
        assert_eq!(settings.color_mode, ColorMode::Bw);

        let link = graph.input_link(file_output, PortName::Image).unwrap();
        assert_eq!(link.from_port, PortName::Depth);
    }

    #[test]
    fn normal_tap_writes_rgba8() {
        let mut scene = Scene::new();
        tap_compositor_aov(&mut scene, Aov::Normal, Path::new("out"));

        assert!(scene.view_layer.use_pass_normal);
        let graph = scene.compositor.as_ref().unwrap();
        let file_output = graph
            .find(|n| matches!(n.kind, NodeKind::FileOutput(_)))
            .unwrap();
        let NodeKind::FileOutput(settings) = &graph.node(file_output).kind else {
            unreachable!()
        };
        assert_eq!(settings.color_depth, ColorDepth::Eight);
        assert_eq!(settings.color_mode, ColorMode::Rgba);
    }

    #[test]
    fn aov_tap_is_idempotent() {
        let mut scene = Scene::new();
        tap_compositor_aov(&mut scene, Aov::Depth, Path::new("out"));
        tap_compositor_aov(&mut scene, Aov::Depth, Path::new("out"));

        let graph = scene.compositor.as_ref().unwrap();
        let outputs = graph
            .nodes()
            .filter(|(_, n)| matches!(n.kind, NodeKind::FileOutput(_)))
            .count();
        assert_eq!(outputs, 1);
        assert_eq!(graph.links().len(), 1);
    }

    #[test]
    fn both_aovs_share_the_render_layers_source() {
        let mut scene = Scene::new();
        tap_compositor_aov(&mut scene, Aov::Depth, Path::new("out"));
        tap_compositor_aov(&mut scene, Aov::Normal, Path::new("out"));

        let graph = scene.compositor.as_ref().unwrap();
        let sources = graph
            .nodes()
            .filter(|(_, n)| matches!(n.kind, NodeKind::RenderLayers))
            .count();
        assert_eq!(sources, 1);
        assert_eq!(graph.links().len(), 2);
    }
}
