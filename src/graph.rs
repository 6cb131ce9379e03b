use std::path::PathBuf;

/// Index into a [`NodeGraph`]'s node table. Ids are only meaningful within
/// the graph that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PortName {
    BaseColor,
    Metallic,
    Roughness,
    Bsdf,
    Surface,
    Color,
    Strength,
    Vector,
    Generated,
    Rotation,
    Red,
    Green,
    Blue,
    Image,
    Depth,
    Normal,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    PrincipledBsdf,
    GlossyBsdf,
    DiffuseBsdf,
    MaterialOutput,
    CombineColor,
    Background,
    ImageTexture { image: PathBuf },
    EnvironmentTexture { image: PathBuf },
    Mapping,
    TextureCoordinate,
    RenderLayers,
    FileOutput(FileOutputSettings),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileOutputSettings {
    pub base_path: PathBuf,
    pub format: ImageFileFormat,
    pub color_depth: ColorDepth,
    pub color_mode: ColorMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ImageFileFormat {
    Png,
    OpenExr,
    Jpeg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColorDepth {
    Eight,
    Sixteen,
    ThirtyTwo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColorMode {
    Bw,
    Rgb,
    Rgba,
}

/// Constant fed into an unlinked input port.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SocketValue {
    Scalar(f64),
    Color([f64; 4]),
    Vector([f64; 3]),
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    /// Default values for unlinked input ports.
    pub defaults: Vec<(PortName, SocketValue)>,
    /// For output sinks (material/file output): whether the renderer reads
    /// this node. At most one material output is active per graph.
    pub active_output: bool,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            defaults: Vec::new(),
            active_output: false,
        }
    }

    pub fn with_default(mut self, port: PortName, value: SocketValue) -> Self {
        self.defaults.push((port, value));
        self
    }

    pub fn default_value(&self, port: PortName) -> Option<SocketValue> {
        self.defaults
            .iter()
            .find(|(p, _)| *p == port)
            .map(|(_, v)| *v)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    pub from_node: NodeId,
    pub from_port: PortName,
    pub to_node: NodeId,
    pub to_port: PortName,
}

/// Directed graph of typed nodes with named ports, used both for material
/// shading trees and the scene compositor tree.
///
/// Input ports are single-assignment: connecting into an already-linked
/// input replaces the previous link. Output ports fan out freely.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node matching the predicate, in insertion order.
    pub fn find(&self, pred: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.nodes().find(|(_, n)| pred(n)).map(|(id, _)| id)
    }

    /// Link `from.from_port` into `to.to_port`, replacing any link already
    /// feeding that input.
    pub fn connect(&mut self, from: NodeId, from_port: PortName, to: NodeId, to_port: PortName) {
        self.links
            .retain(|l| !(l.to_node == to && l.to_port == to_port));
        self.links.push(Link {
            from_node: from,
            from_port,
            to_node: to,
            to_port,
        });
    }

    /// The single link feeding `to.port`, if any.
    pub fn input_link(&self, to: NodeId, port: PortName) -> Option<Link> {
        self.links
            .iter()
            .copied()
            .find(|l| l.to_node == to && l.to_port == port)
    }

    /// Mark `id` as the active output sink, clearing the flag on every other
    /// node.
    pub fn set_active_output(&mut self, id: NodeId) {
        for node in &mut self.nodes {
            node.active_output = false;
        }
        self.nodes[id.0].active_output = true;
    }

    pub fn active_output(&self) -> Option<NodeId> {
        self.find(|n| n.active_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_replaces_existing_input_link() {
        let mut g = NodeGraph::new();
        let a = g.add(Node::new(NodeKind::DiffuseBsdf));
        let b = g.add(Node::new(NodeKind::GlossyBsdf));
        let out = g.add(Node::new(NodeKind::MaterialOutput));

        g.connect(a, PortName::Color, out, PortName::Surface);
        g.connect(b, PortName::Color, out, PortName::Surface);

        assert_eq!(g.links().len(), 1);
        assert_eq!(g.input_link(out, PortName::Surface).unwrap().from_node, b);
    }

    #[test]
    fn output_port_fans_out() {
        let mut g = NodeGraph::new();
        let src = g.add(Node::new(NodeKind::DiffuseBsdf));
        let out_a = g.add(Node::new(NodeKind::MaterialOutput));
        let out_b = g.add(Node::new(NodeKind::MaterialOutput));

        g.connect(src, PortName::Color, out_a, PortName::Surface);
        g.connect(src, PortName::Color, out_b, PortName::Surface);

        assert_eq!(g.links().len(), 2);
    }

    #[test]
    fn set_active_output_is_exclusive() {
        let mut g = NodeGraph::new();
        let a = g.add(Node::new(NodeKind::MaterialOutput));
        let b = g.add(Node::new(NodeKind::MaterialOutput));

        g.set_active_output(a);
        g.set_active_output(b);

        assert_eq!(g.active_output(), Some(b));
        assert!(!g.node(a).active_output);
    }

    #[test]
    fn find_matches_in_insertion_order() {
        let mut g = NodeGraph::new();
        g.add(Node::new(NodeKind::RenderLayers));
        let first = g.find(|n| matches!(n.kind, NodeKind::RenderLayers));
        assert_eq!(first, Some(NodeId(0)));
        assert!(g.find(|n| matches!(n.kind, NodeKind::PrincipledBsdf)).is_none());
    }
}
