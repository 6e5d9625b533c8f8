//! In-memory scene-graph engine.

use async_trait::async_trait;
use cryptoshow_abstraction::{
    AnimationParams, AtomLocus, AtomSelection, ComponentKind, Engine, EngineError, EngineResult,
    LabelProvider, NodeRef, RepresentationSpec, ResidueInfo, ResidueKey, StructureFormat,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Engine operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    /// [`Engine::download`].
    Download,
    /// [`Engine::parse_trajectory`].
    ParseTrajectory,
    /// [`Engine::parse_coordinates`].
    ParseCoordinates,
    /// [`Engine::bind_trajectory`].
    BindTrajectory,
    /// [`Engine::create_model`].
    CreateModel,
    /// [`Engine::create_structure`].
    CreateStructure,
    /// [`Engine::create_component`] and [`Engine::create_selection_component`].
    CreateComponent,
    /// [`Engine::add_representation`].
    AddRepresentation,
    /// [`Engine::set_visibility`].
    SetVisibility,
    /// [`Engine::apply_transparency`].
    ApplyTransparency,
    /// [`Engine::play_animation`].
    PlayAnimation,
}

/// What a scene-graph node holds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Downloaded payload.
    Data {
        /// Source locator.
        url: String,
        /// Binary payload.
        binary: bool,
        /// Payload size when fetched over HTTP.
        bytes: Option<usize>,
    },
    /// Parsed frame source.
    Trajectory {
        /// Parsed format; `None` for trajectories bound from coordinates.
        format: Option<StructureFormat>,
    },
    /// Parsed coordinate set.
    Coordinates,
    /// Model at a frame index.
    Model {
        /// Frame index.
        index: usize,
    },
    /// Structure object.
    Structure,
    /// Static or selection component.
    Component {
        /// Static kind, `None` for selection components.
        kind: Option<ComponentKind>,
        /// Label given at creation.
        label: String,
    },
    /// Representation.
    Representation(RepresentationSpec),
    /// Transparency layer.
    Transparency {
        /// Layer opacity.
        opacity: f32,
    },
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
    visible: bool,
}

#[derive(Default)]
struct SceneGraph {
    nodes: HashMap<NodeRef, Node>,
    commands: Vec<String>,
    failures: HashMap<EngineOp, String>,
    download_failures: Vec<(String, String)>,
    present_components: HashSet<ComponentKind>,
    residues: HashMap<ResidueKey, ResidueInfo>,
    label_providers: HashMap<String, Arc<dyn LabelProvider>>,
    animations: Vec<AnimationParams>,
    camera_resets: usize,
}

impl SceneGraph {
    fn insert(&mut self, kind: NodeKind, parent: Option<&NodeRef>) -> EngineResult<NodeRef> {
        let prefix = match kind {
            NodeKind::Data { .. } => "data",
            NodeKind::Trajectory { .. } => "trajectory",
            NodeKind::Coordinates => "coordinates",
            NodeKind::Model { .. } => "model",
            NodeKind::Structure => "structure",
            NodeKind::Component { .. } => "component",
            NodeKind::Representation(_) => "representation",
            NodeKind::Transparency { .. } => "transparency",
        };
        let node_ref = NodeRef::new(format!("{}-{}", prefix, uuid::Uuid::new_v4().simple()));

        if let Some(parent) = parent {
            self.nodes
                .get_mut(parent)
                .ok_or_else(|| EngineError::UnknownNode(parent.clone()))?
                .children
                .push(node_ref.clone());
        }

        self.nodes.insert(
            node_ref.clone(),
            Node { kind, parent: parent.cloned(), children: Vec::new(), visible: true },
        );
        Ok(node_ref)
    }

    fn require(&self, node: &NodeRef) -> EngineResult<&Node> {
        self.nodes.get(node).ok_or_else(|| EngineError::UnknownNode(node.clone()))
    }

    fn check(&self, op: EngineOp) -> EngineResult<()> {
        match self.failures.get(&op) {
            Some(message) => Err(match op {
                EngineOp::Download => EngineError::Download {
                    url: String::new(),
                    reason: message.clone(),
                },
                EngineOp::ParseTrajectory | EngineOp::ParseCoordinates => {
                    EngineError::Parse(message.clone())
                }
                _ => EngineError::Build(message.clone()),
            }),
            None => Ok(()),
        }
    }

    fn remove_subtree(&mut self, node: &NodeRef) {
        let mut stack = vec![node.clone()];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&current) {
                stack.extend(removed.children);
            }
        }
    }

    fn structure_of(&self, node: &NodeRef) -> Option<NodeRef> {
        let mut current = Some(node.clone());
        while let Some(node_ref) = current {
            let node = self.nodes.get(&node_ref)?;
            if node.kind == NodeKind::Structure {
                return Some(node_ref);
            }
            current = node.parent.clone();
        }
        None
    }
}

/// An in-memory [`Engine`] keeping the whole state tree in a map.
///
/// By default every download succeeds without network access, the polymer
/// component is non-empty and every auxiliary component is empty.
pub struct HeadlessEngine {
    graph: Mutex<SceneGraph>,
    http: Option<reqwest::Client>,
    latency: Duration,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    /// Creates an engine with a non-empty polymer and no auxiliary components.
    pub fn new() -> Self {
        let graph = SceneGraph {
            present_components: HashSet::from([ComponentKind::Polymer]),
            ..SceneGraph::default()
        };
        Self { graph: Mutex::new(graph), http: None, latency: Duration::ZERO }
    }

    /// Downloads fetch their locator over HTTP; failures become download errors.
    #[must_use]
    pub fn with_http(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Every async operation sleeps this long before running.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Marks a static component as non-empty.
    #[must_use]
    pub fn with_component(self, kind: ComponentKind) -> Self {
        self.graph().present_components.insert(kind);
        self
    }

    /// Marks a static component as empty.
    #[must_use]
    pub fn without_component(self, kind: ComponentKind) -> Self {
        self.graph().present_components.remove(&kind);
        self
    }

    /// Provides residue names and positions for `residue_info` and selections.
    #[must_use]
    pub fn with_residues(self, residues: impl IntoIterator<Item = ResidueInfo>) -> Self {
        {
            let mut graph = self.graph();
            for info in residues {
                graph.residues.insert(info.key.clone(), info);
            }
        }
        self
    }

    /// Makes every subsequent call of `op` fail with `message`.
    pub fn fail_on(&self, op: EngineOp, message: impl Into<String>) {
        self.graph().failures.insert(op, message.into());
    }

    /// Makes downloads of locators containing `pattern` fail.
    pub fn fail_download_of(&self, pattern: impl Into<String>, message: impl Into<String>) {
        self.graph().download_failures.push((pattern.into(), message.into()));
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        let mut graph = self.graph();
        graph.failures.clear();
        graph.download_failures.clear();
    }

    fn graph(&self) -> MutexGuard<'_, SceneGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn record(graph: &mut SceneGraph, command: String) {
        debug!(command = %command, "Engine command");
        graph.commands.push(command);
    }

    /// Number of nodes currently alive.
    pub fn live_nodes(&self) -> usize {
        self.graph().nodes.len()
    }

    /// Number of live nodes matching a predicate on their kind.
    pub fn count_nodes<F>(&self, predicate: F) -> usize
    where
        F: Fn(&NodeKind) -> bool,
    {
        self.graph().nodes.values().filter(|n| predicate(&n.kind)).count()
    }

    /// Number of live representations.
    pub fn representation_count(&self) -> usize {
        self.count_nodes(|k| matches!(k, NodeKind::Representation(_)))
    }

    /// Number of live transparency layers.
    pub fn transparency_count(&self) -> usize {
        self.count_nodes(|k| matches!(k, NodeKind::Transparency { .. }))
    }

    /// Returns true if the node is alive.
    pub fn exists(&self, node: &NodeRef) -> bool {
        self.graph().nodes.contains_key(node)
    }

    /// The node's own visibility flag, `None` if it does not exist.
    pub fn is_visible(&self, node: &NodeRef) -> Option<bool> {
        self.graph().nodes.get(node).map(|n| n.visible)
    }

    /// The node's kind, `None` if it does not exist.
    pub fn node_kind(&self, node: &NodeRef) -> Option<NodeKind> {
        self.graph().nodes.get(node).map(|n| n.kind.clone())
    }

    /// Children of a node in creation order.
    pub fn children(&self, node: &NodeRef) -> Vec<NodeRef> {
        self.graph().nodes.get(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// Opacity of the transparency layer on a representation, if any.
    pub fn transparency_of(&self, representation: &NodeRef) -> Option<f32> {
        let graph = self.graph();
        graph.nodes.get(representation)?.children.iter().find_map(|child| {
            match graph.nodes.get(child).map(|n| &n.kind) {
                Some(NodeKind::Transparency { opacity }) => Some(*opacity),
                _ => None,
            }
        })
    }

    /// Recorded commands, oldest first.
    pub fn commands(&self) -> Vec<String> {
        self.graph().commands.clone()
    }

    /// Playback requests, oldest first.
    pub fn animations(&self) -> Vec<AnimationParams> {
        self.graph().animations.clone()
    }

    /// Number of camera resets.
    pub fn camera_resets(&self) -> usize {
        self.graph().camera_resets
    }

    /// Names of registered label providers.
    pub fn label_provider_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.graph().label_providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Labels every registered provider reports for a locus.
    pub fn labels_for(&self, locus: &AtomLocus) -> Vec<String> {
        let providers: Vec<_> = self.graph().label_providers.values().cloned().collect();
        providers.iter().filter_map(|p| p.label(locus)).collect()
    }

    async fn fetch(&self, url: &str) -> EngineResult<Option<usize>> {
        let Some(ref client) = self.http else {
            return Ok(None);
        };
        let download_error =
            |reason: String| EngineError::Download { url: url.to_string(), reason };

        let response = client.get(url).send().await.map_err(|e| download_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status())));
        }
        let body = response.bytes().await.map_err(|e| download_error(e.to_string()))?;
        Ok(Some(body.len()))
    }
}

#[async_trait]
impl Engine for HeadlessEngine {
    async fn download(&self, url: &str, binary: bool) -> EngineResult<NodeRef> {
        self.pause().await;
        {
            let graph = self.graph();
            graph.check(EngineOp::Download).map_err(|e| match e {
                EngineError::Download { reason, .. } => {
                    EngineError::Download { url: url.to_string(), reason }
                }
                other => other,
            })?;
            if let Some((_, reason)) =
                graph.download_failures.iter().find(|(pattern, _)| url.contains(pattern.as_str()))
            {
                return Err(EngineError::Download { url: url.to_string(), reason: reason.clone() });
            }
        }

        let bytes = self.fetch(url).await?;

        let mut graph = self.graph();
        Self::record(&mut graph, format!("download {}", url));
        graph.insert(NodeKind::Data { url: url.to_string(), binary, bytes }, None)
    }

    async fn parse_trajectory(
        &self,
        data: &NodeRef,
        format: StructureFormat,
    ) -> EngineResult<NodeRef> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::ParseTrajectory)?;
        graph.require(data)?;
        Self::record(&mut graph, format!("parse-trajectory {} {}", data, format));
        graph.insert(NodeKind::Trajectory { format: Some(format) }, Some(data))
    }

    async fn parse_coordinates(&self, data: &NodeRef) -> EngineResult<NodeRef> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::ParseCoordinates)?;
        graph.require(data)?;
        Self::record(&mut graph, format!("parse-coordinates {}", data));
        graph.insert(NodeKind::Coordinates, Some(data))
    }

    async fn bind_trajectory(
        &self,
        model: &NodeRef,
        coordinates: &NodeRef,
    ) -> EngineResult<NodeRef> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::BindTrajectory)?;
        graph.require(model)?;
        graph.require(coordinates)?;
        Self::record(&mut graph, format!("bind-trajectory {} {}", model, coordinates));
        graph.insert(NodeKind::Trajectory { format: None }, Some(model))
    }

    async fn create_model(
        &self,
        trajectory: &NodeRef,
        model_index: usize,
    ) -> EngineResult<NodeRef> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::CreateModel)?;
        graph.require(trajectory)?;
        Self::record(&mut graph, format!("create-model {} {}", trajectory, model_index));
        graph.insert(NodeKind::Model { index: model_index }, Some(trajectory))
    }

    async fn create_structure(&self, model: &NodeRef) -> EngineResult<NodeRef> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::CreateStructure)?;
        graph.require(model)?;
        Self::record(&mut graph, format!("create-structure {}", model));
        graph.insert(NodeKind::Structure, Some(model))
    }

    async fn create_component(
        &self,
        structure: &NodeRef,
        kind: ComponentKind,
    ) -> EngineResult<Option<NodeRef>> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::CreateComponent)?;
        graph.require(structure)?;
        if !graph.present_components.contains(&kind) {
            return Ok(None);
        }
        Self::record(&mut graph, format!("create-component {} {}", structure, kind.as_str()));
        graph
            .insert(
                NodeKind::Component { kind: Some(kind), label: kind.as_str().to_string() },
                Some(structure),
            )
            .map(Some)
    }

    async fn create_selection_component(
        &self,
        structure: &NodeRef,
        selection: &AtomSelection,
        label: &str,
    ) -> EngineResult<Option<NodeRef>> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::CreateComponent)?;
        graph.require(structure)?;

        let matches_any = match selection {
            AtomSelection::All => true,
            AtomSelection::Residues(residues) => {
                !residues.is_empty()
                    && (graph.residues.is_empty()
                        || residues.iter().any(|r| graph.residues.contains_key(r)))
            }
        };
        if !matches_any {
            return Ok(None);
        }

        Self::record(&mut graph, format!("create-selection {} {}", structure, label));
        graph
            .insert(NodeKind::Component { kind: None, label: label.to_string() }, Some(structure))
            .map(Some)
    }

    async fn add_representation(
        &self,
        component: &NodeRef,
        spec: &RepresentationSpec,
    ) -> EngineResult<NodeRef> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::AddRepresentation)?;
        graph.require(component)?;
        Self::record(&mut graph, format!("add-representation {} {}", component, spec.style));
        graph.insert(NodeKind::Representation(*spec), Some(component))
    }

    fn set_visibility(&self, node: &NodeRef, visible: bool) -> EngineResult<()> {
        let mut graph = self.graph();
        graph.check(EngineOp::SetVisibility)?;
        let entry = graph.nodes.get_mut(node).ok_or_else(|| EngineError::UnknownNode(node.clone()))?;
        entry.visible = visible;
        Ok(())
    }

    async fn apply_transparency(
        &self,
        representation: &NodeRef,
        structure: &NodeRef,
        _selection: &AtomSelection,
        opacity: f32,
    ) -> EngineResult<NodeRef> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::ApplyTransparency)?;
        graph.require(representation)?;
        graph.require(structure)?;
        if graph.structure_of(representation).as_ref() != Some(structure) {
            return Err(EngineError::Build(format!(
                "{} does not belong to {}",
                representation, structure
            )));
        }
        Self::record(&mut graph, format!("transparency {} {}", representation, opacity));
        graph.insert(NodeKind::Transparency { opacity }, Some(representation))
    }

    async fn delete(&self, node: &NodeRef) -> EngineResult<()> {
        self.pause().await;
        let mut graph = self.graph();
        let parent = graph.require(node)?.parent.clone();
        if let Some(parent) = parent {
            if let Some(parent_node) = graph.nodes.get_mut(&parent) {
                parent_node.children.retain(|c| c != node);
            }
        }
        graph.remove_subtree(node);
        Self::record(&mut graph, format!("delete {}", node));
        Ok(())
    }

    async fn play_animation(&self, params: AnimationParams) -> EngineResult<()> {
        self.pause().await;
        let mut graph = self.graph();
        graph.check(EngineOp::PlayAnimation)?;
        Self::record(&mut graph, format!("play {} fps", params.target_fps));
        graph.animations.push(params);
        Ok(())
    }

    fn reset_camera(&self) {
        let mut graph = self.graph();
        Self::record(&mut graph, "reset-camera".to_string());
        graph.camera_resets += 1;
    }

    fn register_label_provider(&self, name: &str, provider: Arc<dyn LabelProvider>) {
        let mut graph = self.graph();
        Self::record(&mut graph, format!("register-label-provider {}", name));
        graph.label_providers.insert(name.to_string(), provider);
    }

    fn residue_info(&self, structure: &NodeRef, residue: &ResidueKey) -> Option<ResidueInfo> {
        let graph = self.graph();
        if !graph.nodes.contains_key(structure) {
            return None;
        }
        graph.residues.get(residue).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptoshow_abstraction::{ColorTheme, Point3, Style};

    async fn structure(engine: &HeadlessEngine) -> (NodeRef, NodeRef) {
        let data = engine.download("/file/h/2rfc.cif", false).await.unwrap();
        let trajectory = engine.parse_trajectory(&data, StructureFormat::Mmcif).await.unwrap();
        let model = engine.create_model(&trajectory, 0).await.unwrap();
        let structure = engine.create_structure(&model).await.unwrap();
        (data, structure)
    }

    #[tokio::test]
    async fn test_delete_removes_subtree() {
        let engine = HeadlessEngine::new();
        let (data, structure) = structure(&engine).await;
        let polymer =
            engine.create_component(&structure, ComponentKind::Polymer).await.unwrap().unwrap();
        engine
            .add_representation(&polymer, &RepresentationSpec::new(Style::Cartoon, ColorTheme::ChainId))
            .await
            .unwrap();
        assert_eq!(engine.live_nodes(), 6);

        engine.delete(&data).await.unwrap();
        assert_eq!(engine.live_nodes(), 0);
        assert!(matches!(engine.delete(&data).await, Err(EngineError::UnknownNode(_))));
    }

    #[tokio::test]
    async fn test_empty_components() {
        let engine = HeadlessEngine::new().with_component(ComponentKind::Ligand);
        let (_, structure) = structure(&engine).await;

        assert!(engine.create_component(&structure, ComponentKind::Ligand).await.unwrap().is_some());
        assert!(engine.create_component(&structure, ComponentKind::Ion).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_selection_against_residue_table() {
        let engine = HeadlessEngine::new().with_residues([ResidueInfo {
            key: ResidueKey::new("A", 10),
            name: "LEU".to_string(),
            position: Point3::new(0.0, 0.0, 0.0),
        }]);
        let (_, structure) = structure(&engine).await;

        let hit = AtomSelection::Residues(vec![ResidueKey::new("A", 10)]);
        let miss = AtomSelection::Residues(vec![ResidueKey::new("Z", 1)]);
        assert!(engine.create_selection_component(&structure, &hit, "p").await.unwrap().is_some());
        assert!(engine.create_selection_component(&structure, &miss, "p").await.unwrap().is_none());
        assert_eq!(
            engine.residue_info(&structure, &ResidueKey::new("A", 10)).map(|r| r.name),
            Some("LEU".to_string())
        );
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let engine = HeadlessEngine::new();
        engine.fail_on(EngineOp::CreateStructure, "no atoms");
        let data = engine.download("/file/h/x.pdb", false).await.unwrap();
        let trajectory = engine.parse_trajectory(&data, StructureFormat::Pdb).await.unwrap();
        let model = engine.create_model(&trajectory, 0).await.unwrap();
        assert_eq!(
            engine.create_structure(&model).await,
            Err(EngineError::Build("no atoms".to_string()))
        );

        engine.fail_download_of("trajectory.xtc", "404");
        let err = engine.download("/file/h/trajectory.xtc", true).await.unwrap_err();
        assert!(matches!(err, EngineError::Download { ref url, .. } if url.ends_with(".xtc")));

        engine.clear_failures();
        assert!(engine.create_structure(&model).await.is_ok());
    }

    #[tokio::test]
    async fn test_transparency_and_visibility() {
        let engine = HeadlessEngine::new();
        let (_, structure) = structure(&engine).await;
        let polymer =
            engine.create_component(&structure, ComponentKind::Polymer).await.unwrap().unwrap();
        let rep = engine
            .add_representation(&polymer, &RepresentationSpec::new(Style::Cartoon, ColorTheme::ChainId))
            .await
            .unwrap();

        engine.set_visibility(&rep, false).unwrap();
        assert_eq!(engine.is_visible(&rep), Some(false));

        engine.apply_transparency(&rep, &structure, &AtomSelection::All, 0.25).await.unwrap();
        assert_eq!(engine.transparency_of(&rep), Some(0.25));
        assert_eq!(engine.is_visible(&rep), Some(false));
    }

    #[tokio::test]
    async fn test_http_download() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/file/h/2rfc.cif").with_status(200).with_body("data_2RFC").create();
        let _missing = server.mock("GET", "/file/h/none.cif").with_status(404).create();

        let engine = HeadlessEngine::new().with_http(reqwest::Client::new());
        let data = engine.download(&format!("{}/file/h/2rfc.cif", server.url()), false).await.unwrap();
        assert!(matches!(engine.node_kind(&data), Some(NodeKind::Data { bytes: Some(9), .. })));
        mock.assert();

        let err = engine.download(&format!("{}/file/h/none.cif", server.url()), false).await;
        assert!(matches!(err, Err(EngineError::Download { .. })));
    }

    #[test]
    fn test_camera_and_labels() {
        struct Fixed;
        impl LabelProvider for Fixed {
            fn label(&self, _locus: &AtomLocus) -> Option<String> {
                Some("Pocket: 1".to_string())
            }
        }

        let engine = HeadlessEngine::new();
        engine.reset_camera();
        engine.register_label_provider("pockets", Arc::new(Fixed));
        engine.register_label_provider("pockets", Arc::new(Fixed));

        assert_eq!(engine.camera_resets(), 1);
        assert_eq!(engine.label_provider_names(), vec!["pockets".to_string()]);
        let locus = AtomLocus { residue: ResidueKey::new("A", 1), atom_name: None };
        assert_eq!(engine.labels_for(&locus), vec!["Pocket: 1".to_string()]);
    }
}
