//! Transform chains and the nodes that execute them.

use crate::attributes::{AttributeContainer, Capability};
use crate::dependencies::{TransformDependencies, TransformUpstreamDependencies};
use crate::error::{TransformError, TransformResult};
use crate::services::{ProjectServices, TransformAction};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_graph::Value;

/// A registered artifact transform.
#[derive(Debug)]
pub struct Transform {
    /// Name the action is registered under.
    pub implementation: String,
    /// Name shown in reports and failures.
    pub display_name: String,
    /// Attributes of the artifacts the transform accepts.
    pub from_attributes: AttributeContainer,
    /// Attributes of the artifacts it produces.
    pub to_attributes: AttributeContainer,
    /// Whether the action consumes the upstream dependencies of its input.
    pub requires_dependencies: bool,
    /// Parameters passed to every invocation.
    pub parameters: Value,
    /// The action.
    pub action: Arc<dyn TransformAction>,
}

/// A transform applied on behalf of a project.
#[derive(Debug)]
pub struct TransformStep {
    transform: Arc<Transform>,
    owner: Option<Arc<ProjectServices>>,
    upstream: Arc<dyn TransformUpstreamDependencies>,
    workspace: PathBuf,
}

impl TransformStep {
    /// Creates a step.
    ///
    /// Outputs go to the transform workspace of `owner`, or below
    /// `build_workspace` if the step has no owning project.
    pub fn new(
        transform: Arc<Transform>,
        owner: Option<Arc<ProjectServices>>,
        upstream: Arc<dyn TransformUpstreamDependencies>,
        build_workspace: &Path,
    ) -> Self {
        let workspace = match &owner {
            Some(project) => project.transform_workspace(&transform.display_name),
            None => build_workspace.join("transforms").join(&transform.display_name),
        };
        Self {
            transform,
            owner,
            upstream,
            workspace,
        }
    }

    /// The transform.
    pub fn transform(&self) -> &Arc<Transform> {
        &self.transform
    }

    /// The owning project, if any.
    pub fn owner(&self) -> Option<&Arc<ProjectServices>> {
        self.owner.as_ref()
    }

    /// Resolver of the upstream dependencies.
    pub fn upstream(&self) -> &Arc<dyn TransformUpstreamDependencies> {
        &self.upstream
    }

    /// Directory outputs are written to.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// The dependencies handed to the action.
    pub fn dependencies(&self) -> TransformResult<TransformDependencies> {
        if self.transform.requires_dependencies {
            self.upstream.compute_artifacts()
        } else {
            Ok(TransformDependencies::NotRequired)
        }
    }

    /// Runs the transform on `input`.
    pub fn execute(&self, input: &Path) -> TransformResult<Vec<PathBuf>> {
        let dependencies = self.dependencies()?;
        self.transform
            .action
            .transform(
                &self.workspace,
                input,
                &self.transform.parameters,
                dependencies.files().unwrap_or_default(),
            )
            .map_err(|message| TransformError::Action {
                transform: self.transform.display_name.clone(),
                input: input.to_path_buf(),
                message,
            })
    }
}

/// A sequence of steps. The initial chain runs first.
#[derive(Debug)]
pub struct TransformChain {
    init: Option<Arc<TransformChain>>,
    step: Arc<TransformStep>,
}

impl TransformChain {
    /// Appends `step` to `init`.
    pub fn new(init: Option<Arc<TransformChain>>, step: Arc<TransformStep>) -> Self {
        Self { init, step }
    }

    /// The chain running before the last step.
    pub fn init(&self) -> Option<&Arc<TransformChain>> {
        self.init.as_ref()
    }

    /// The last step.
    pub fn step(&self) -> &Arc<TransformStep> {
        &self.step
    }

    /// All steps in execution order.
    pub fn steps(&self) -> Vec<Arc<TransformStep>> {
        let mut steps = self.init.as_ref().map(|init| init.steps()).unwrap_or_default();
        steps.push(Arc::clone(&self.step));
        steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        1 + self.init.as_ref().map_or(0, |init| init.len())
    }

    /// Always `false`; a chain has at least one step.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Display names of the steps joined in execution order.
    pub fn display_name(&self) -> String {
        self.steps()
            .iter()
            .map(|step| step.transform.display_name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Creates the nodes transforming `artifact` through the whole chain and
    /// returns the node of the last step.
    pub fn schedule(&self, artifact: &Path, ids: &AtomicU64) -> Arc<TransformStepNode> {
        let input = match &self.init {
            None => StepInput::Initial {
                artifact: artifact.to_path_buf(),
            },
            Some(init) => StepInput::Chained {
                previous: init.schedule(artifact, ids),
            },
        };
        Arc::new(TransformStepNode::new(
            ids.fetch_add(1, Ordering::Relaxed),
            input,
            Arc::clone(&self.step),
        ))
    }
}

/// Where a node takes its input from.
#[derive(Debug)]
pub enum StepInput {
    /// A source artifact.
    Initial {
        /// The artifact file.
        artifact: PathBuf,
    },
    /// The outputs of the previous node of the chain.
    Chained {
        /// The previous node.
        previous: Arc<TransformStepNode>,
    },
}

/// One step of a chain applied to one source artifact.
#[derive(Debug)]
pub struct TransformStepNode {
    id: u64,
    input: StepInput,
    step: Arc<TransformStep>,
    outputs: Mutex<Option<Vec<PathBuf>>>,
}

impl TransformStepNode {
    /// Creates a node that has not run yet.
    pub fn new(id: u64, input: StepInput, step: Arc<TransformStep>) -> Self {
        Self {
            id,
            input,
            step,
            outputs: Mutex::new(None),
        }
    }

    /// Build-unique id of the node.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Input of the node.
    pub fn input(&self) -> &StepInput {
        &self.input
    }

    /// The step the node runs.
    pub fn step(&self) -> &Arc<TransformStep> {
        &self.step
    }

    /// Runs the node after its predecessors. Successful outputs are kept, so
    /// each node runs at most once.
    pub fn execute(&self) -> TransformResult<Vec<PathBuf>> {
        if let Some(outputs) = self.outputs.lock().as_ref() {
            return Ok(outputs.clone());
        }
        let inputs = match &self.input {
            StepInput::Initial { artifact } => vec![artifact.clone()],
            StepInput::Chained { previous } => previous.execute()?,
        };
        let mut outputs = Vec::new();
        for input in &inputs {
            outputs.extend(self.step.execute(input)?);
        }
        *self.outputs.lock() = Some(outputs.clone());
        Ok(outputs)
    }
}

/// The transformed artifacts of one component variant.
#[derive(Debug)]
pub struct TransformedArtifactSet {
    /// Component the artifacts belong to.
    pub component: String,
    /// Attributes of the produced variant.
    pub target_attributes: AttributeContainer,
    /// Capabilities of the produced variant.
    pub capabilities: Vec<Capability>,
    /// One node per source artifact.
    pub nodes: Vec<Arc<TransformStepNode>>,
}

impl TransformedArtifactSet {
    /// Schedules `chain` for every artifact of `component`.
    pub fn new(
        component: impl Into<String>,
        target_attributes: AttributeContainer,
        capabilities: Vec<Capability>,
        chain: &TransformChain,
        artifacts: &[PathBuf],
        ids: &AtomicU64,
    ) -> Self {
        Self {
            component: component.into(),
            target_attributes,
            capabilities,
            nodes: artifacts
                .iter()
                .map(|artifact| chain.schedule(artifact, ids))
                .collect(),
        }
    }

    /// Runs every node and returns all outputs in artifact order.
    pub fn files(&self) -> TransformResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for node in &self.nodes {
            files.extend(node.execute()?);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::{FixedUpstreamDependencies, ResolvingUpstreamDependencies};

    struct Rename(&'static str);

    impl TransformAction for Rename {
        fn transform(
            &self,
            workspace: &Path,
            input: &Path,
            _parameters: &Value,
            dependencies: &[PathBuf],
        ) -> Result<Vec<PathBuf>, String> {
            let name = input
                .file_name()
                .ok_or("input has no file name")?
                .to_string_lossy();
            let mut outputs = vec![workspace.join(format!("{name}.{}", self.0))];
            outputs.extend(dependencies.iter().cloned());
            Ok(outputs)
        }
    }

    fn transform(name: &'static str, requires_dependencies: bool) -> Arc<Transform> {
        Arc::new(Transform {
            implementation: format!("org.example.{name}"),
            display_name: name.to_string(),
            from_attributes: AttributeContainer::new(),
            to_attributes: AttributeContainer::new().with("artifactType", name),
            requires_dependencies,
            parameters: None,
            action: Arc::new(Rename(name)),
        })
    }

    fn step(name: &'static str) -> Arc<TransformStep> {
        Arc::new(TransformStep::new(
            transform(name, false),
            None,
            Arc::new(FixedUpstreamDependencies::not_required()),
            Path::new("/build"),
        ))
    }

    #[test]
    fn chain_runs_steps_in_order() {
        let first = Arc::new(TransformChain::new(None, step("unzip")));
        let chain = TransformChain::new(Some(first), step("minify"));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.display_name(), "unzip -> minify");

        let ids = AtomicU64::new(0);
        let node = chain.schedule(Path::new("libs/a.zip"), &ids);
        assert_eq!(node.id(), 1);
        assert!(matches!(node.input(), StepInput::Chained { previous } if previous.id() == 0));
        assert_eq!(
            node.execute().unwrap(),
            vec![PathBuf::from("/build/transforms/minify/a.zip.unzip.minify")]
        );
    }

    #[test]
    fn upstream_dependencies_only_reach_transforms_that_require_them() {
        let upstream: Arc<dyn TransformUpstreamDependencies> =
            Arc::new(ResolvingUpstreamDependencies::new("runtimeClasspath", "link", || {
                Ok(vec![PathBuf::from("libs/dep.jar")])
            }));
        let linking = TransformStep::new(
            transform("link", true),
            None,
            Arc::clone(&upstream),
            Path::new("/build"),
        );
        let plain = TransformStep::new(transform("copy", false), None, upstream, Path::new("/build"));

        assert_eq!(
            linking.execute(Path::new("a.jar")).unwrap(),
            vec![
                PathBuf::from("/build/transforms/link/a.jar.link"),
                PathBuf::from("libs/dep.jar")
            ]
        );
        assert_eq!(plain.dependencies().unwrap(), TransformDependencies::NotRequired);
        assert_eq!(plain.execute(Path::new("a.jar")).unwrap().len(), 1);
    }

    #[test]
    fn action_failures_name_the_transform() {
        let node = TransformChain::new(None, step("unzip")).schedule(Path::new("/"), &AtomicU64::new(0));
        let err = node.execute().unwrap_err();
        assert!(matches!(err, TransformError::Action { ref transform, .. } if transform == "unzip"));
    }

    #[test]
    fn artifact_set_keeps_artifact_order() {
        let chain = TransformChain::new(None, step("unzip"));
        let set = TransformedArtifactSet::new(
            "org:lib:1.0",
            AttributeContainer::new().with("artifactType", "unzip"),
            Vec::new(),
            &chain,
            &[PathBuf::from("b.zip"), PathBuf::from("a.zip")],
            &AtomicU64::new(0),
        );
        assert_eq!(
            set.files().unwrap(),
            vec![
                PathBuf::from("/build/transforms/unzip/b.zip.unzip"),
                PathBuf::from("/build/transforms/unzip/a.zip.unzip"),
            ]
        );
    }
}
