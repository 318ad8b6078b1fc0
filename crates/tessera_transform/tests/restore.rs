use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tessera_common::ProjectPath;
use tessera_diagnostics::ProblemSink;
use tessera_graph::{
    default_bindings, downcast, Bindings, CodecError, CodecSettings, LambdaRegistry, ObjectRef,
    SerializationRegistry, SharedBuffer, Value,
};
use tessera_transform::{
    transform_bindings, AttributeContainer, BuildServices, Capability, ProjectLookup,
    ProjectServices, ResolvingUpstreamDependencies, StepInput, Transform, TransformAction,
    TransformChain, TransformDependencies, TransformStep, TransformUpstreamDependencies,
    TransformedArtifactSet,
};

struct Suffix;

impl TransformAction for Suffix {
    fn transform(
        &self,
        workspace: &Path,
        input: &Path,
        parameters: &Value,
        dependencies: &[PathBuf],
    ) -> Result<Vec<PathBuf>, String> {
        let suffix = parameters
            .as_ref()
            .and_then(|obj| downcast::<String>(obj))
            .ok_or("missing suffix parameter")?;
        let name = input.file_name().ok_or("input has no file name")?;
        let mut outputs = vec![workspace.join(format!("{}.{suffix}", name.to_string_lossy()))];
        outputs.extend(dependencies.iter().cloned());
        Ok(outputs)
    }
}

/// Projects and actions of one build invocation.
struct Build {
    dir: PathBuf,
    projects: HashMap<ProjectPath, Arc<ProjectServices>>,
    actions: HashMap<String, Arc<dyn TransformAction>>,
}

impl Build {
    fn new(dir: &Path, projects: &[&str]) -> Arc<Self> {
        let projects = projects
            .iter()
            .map(|path| {
                let identity_path = ProjectPath::parse(path).unwrap();
                let project_dir = dir.join(&path[1..]);
                let services = ProjectServices::new(
                    identity_path.clone(),
                    project_dir.clone(),
                    project_dir.join("build"),
                );
                (identity_path, Arc::new(services))
            })
            .collect();
        let mut actions: HashMap<String, Arc<dyn TransformAction>> = HashMap::new();
        actions.insert("org.example.Suffix".into(), Arc::new(Suffix));
        Arc::new(Self {
            dir: dir.to_path_buf(),
            projects,
            actions,
        })
    }

    fn services_of(&self, path: &str) -> Arc<ProjectServices> {
        Arc::clone(&self.projects[&ProjectPath::parse(path).unwrap()])
    }

    fn bindings(self: &Arc<Self>) -> Arc<Bindings> {
        let builder = default_bindings(
            Arc::new(SerializationRegistry::with_defaults()),
            Arc::new(LambdaRegistry::new()),
        );
        let projects: Arc<dyn ProjectLookup> = self.clone();
        let services: Arc<dyn BuildServices> = self.clone();
        transform_bindings(builder, projects, services).build()
    }
}

impl ProjectLookup for Build {
    fn project(&self, path: &ProjectPath) -> Option<Arc<ProjectServices>> {
        self.projects.get(path).cloned()
    }
}

impl BuildServices for Build {
    fn transform_action(&self, implementation: &str) -> Option<Arc<dyn TransformAction>> {
        self.actions.get(implementation).cloned()
    }

    fn build_workspace(&self) -> PathBuf {
        self.dir.join("build")
    }
}

fn suffix_transform(build: &Build, suffix: &str, requires_dependencies: bool) -> Arc<Transform> {
    Arc::new(Transform {
        implementation: "org.example.Suffix".into(),
        display_name: format!("Suffix({suffix})"),
        from_attributes: AttributeContainer::new().with("artifactType", "jar"),
        to_attributes: AttributeContainer::new().with("artifactType", suffix),
        requires_dependencies,
        parameters: tessera_graph::value(suffix.to_string()),
        action: Arc::clone(&build.actions["org.example.Suffix"]),
    })
}

fn store(build: &Arc<Build>, value: &Value) -> Result<SharedBuffer, CodecError> {
    let buffer = SharedBuffer::new();
    let mut ctx = CodecSettings::default().writer(
        buffer.clone(),
        build.bindings(),
        Arc::new(ProblemSink::new()),
    );
    ctx.write_value(value)?;
    ctx.flush()?;
    Ok(buffer)
}

fn load(build: &Arc<Build>, buffer: &SharedBuffer) -> Result<Value, CodecError> {
    let mut ctx = CodecSettings::default().reader(
        Cursor::new(buffer.bytes()),
        build.bindings(),
        Arc::new(ProblemSink::new()),
    );
    ctx.read_value()
}

fn as_list(value: Value) -> Vec<Value> {
    let obj = value.expect("stored list");
    downcast::<Vec<Value>>(&obj).expect("list").as_ref().clone()
}

fn artifact_set(value: &Value) -> Arc<TransformedArtifactSet> {
    downcast::<TransformedArtifactSet>(value.as_ref().expect("artifact set")).expect("artifact set")
}

#[test]
fn restored_steps_are_bound_to_the_loading_build() {
    let dir = TempDir::new().unwrap();
    let storing = Build::new(dir.path(), &[":app", ":lib"]);
    let resolutions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resolutions);
    let upstream: Arc<dyn TransformUpstreamDependencies> = Arc::new(
        ResolvingUpstreamDependencies::new(":app:runtimeClasspath", "Suffix(min)", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![PathBuf::from("libs/dep.jar")])
        }),
    );
    let unzip = Arc::new(TransformChain::new(
        None,
        Arc::new(TransformStep::new(
            suffix_transform(&storing, "classes", false),
            Some(storing.services_of(":app")),
            Arc::new(tessera_transform::FixedUpstreamDependencies::not_required()),
            &storing.build_workspace(),
        )),
    ));
    let chain = TransformChain::new(
        Some(unzip),
        Arc::new(TransformStep::new(
            suffix_transform(&storing, "min", true),
            Some(storing.services_of(":app")),
            upstream,
            &storing.build_workspace(),
        )),
    );
    let set = Arc::new(TransformedArtifactSet::new(
        "project :lib",
        AttributeContainer::new().with("artifactType", "min"),
        vec![Capability {
            group: "org.example".into(),
            name: "lib".into(),
            version: None,
        }],
        &chain,
        &[dir.path().join("lib/build/lib.jar")],
        &AtomicU64::new(0),
    ));
    let shared: ObjectRef = set;
    let buffer = store(
        &storing,
        &tessera_graph::value(vec![Some(shared.clone()), Some(shared)]),
    )
    .unwrap();
    assert_eq!(resolutions.load(Ordering::SeqCst), 1);

    let loading = Build::new(dir.path(), &[":app", ":lib"]);
    let list = as_list(load(&loading, &buffer).unwrap());
    let first = artifact_set(&list[0]);
    let second = artifact_set(&list[1]);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.component, "project :lib");
    assert_eq!(first.target_attributes.get("artifactType"), Some("min"));
    assert_eq!(first.capabilities[0].to_string(), "org.example:lib");

    let node = &first.nodes[0];
    let owner = node.step().owner().expect("owned step");
    assert!(Arc::ptr_eq(owner, &loading.services_of(":app")));
    assert!(!Arc::ptr_eq(owner, &storing.services_of(":app")));
    assert!(Arc::ptr_eq(
        &node.step().transform().action,
        &loading.actions["org.example.Suffix"]
    ));
    assert_eq!(
        node.step().upstream().compute_artifacts().unwrap(),
        TransformDependencies::FileDependencies {
            files: vec![PathBuf::from("libs/dep.jar")]
        }
    );
    match node.input() {
        StepInput::Chained { previous } => {
            assert_eq!(previous.id(), 0);
            assert_eq!(
                previous.step().upstream().compute_artifacts().unwrap(),
                TransformDependencies::NotRequired
            );
        }
        StepInput::Initial { .. } => panic!("expected a chained node"),
    }

    let workspace = dir.path().join("app/build/transforms");
    assert_eq!(
        first.files().unwrap(),
        vec![
            workspace.join("Suffix(min)/lib.jar.classes.min"),
            PathBuf::from("libs/dep.jar"),
        ]
    );
    assert_eq!(resolutions.load(Ordering::SeqCst), 1);
}

#[test]
fn transforms_shared_between_steps_stay_shared() {
    let dir = TempDir::new().unwrap();
    let build = Build::new(dir.path(), &[":app", ":lib"]);
    let transform = suffix_transform(&build, "classes", false);
    let steps: Vec<Value> = [":app", ":lib"]
        .iter()
        .map(|path| {
            tessera_graph::value(TransformStep::new(
                Arc::clone(&transform),
                Some(build.services_of(path)),
                Arc::new(tessera_transform::FixedUpstreamDependencies::not_required()),
                &build.build_workspace(),
            ))
        })
        .collect();

    let buffer = store(&build, &tessera_graph::value(steps)).unwrap();
    let list = as_list(load(&build, &buffer).unwrap());
    let step = |value: &Value| downcast::<TransformStep>(value.as_ref().unwrap()).unwrap();
    let (app, lib) = (step(&list[0]), step(&list[1]));
    assert!(Arc::ptr_eq(app.transform(), lib.transform()));
    assert!(!Arc::ptr_eq(app.transform(), &transform));
    assert_eq!(app.workspace(), dir.path().join("app/build/transforms/Suffix(classes)"));
    assert_eq!(lib.workspace(), dir.path().join("lib/build/transforms/Suffix(classes)"));
}

#[test]
fn steps_without_an_owner_use_the_build_workspace() {
    let dir = TempDir::new().unwrap();
    let build = Build::new(dir.path(), &[]);
    let step = tessera_graph::value(TransformStep::new(
        suffix_transform(&build, "classes", false),
        None,
        Arc::new(tessera_transform::FixedUpstreamDependencies::not_required()),
        &build.build_workspace(),
    ));
    let buffer = store(&build, &step).unwrap();
    let restored = load(&build, &buffer).unwrap().unwrap();
    let restored = downcast::<TransformStep>(&restored).unwrap();
    assert!(restored.owner().is_none());
    assert_eq!(
        restored.workspace(),
        dir.path().join("build/transforms/Suffix(classes)")
    );
}

#[test]
fn corrupt_node_count_fails_the_load() {
    let dir = TempDir::new().unwrap();
    let build = Build::new(dir.path(), &[":lib"]);
    let chain = TransformChain::new(
        None,
        Arc::new(TransformStep::new(
            suffix_transform(&build, "classes", false),
            None,
            Arc::new(tessera_transform::FixedUpstreamDependencies::not_required()),
            &build.build_workspace(),
        )),
    );
    let set = TransformedArtifactSet::new(
        "project :lib",
        AttributeContainer::new(),
        Vec::new(),
        &chain,
        &[],
        &AtomicU64::new(0),
    );
    let buffer = store(&build, &tessera_graph::value(set)).unwrap();

    // The node count is the last thing written; claim half a billion nodes.
    let mut bytes = buffer.bytes();
    assert_eq!(bytes.pop(), Some(0));
    bytes.push(252);
    bytes.extend_from_slice(&(1u32 << 29).to_le_bytes());
    let mut corrupt = SharedBuffer::new();
    corrupt.write_all(&bytes).unwrap();

    assert!(matches!(load(&build, &corrupt), Err(CodecError::UnexpectedEof)));
}

#[test]
fn missing_project_fails_the_load() {
    let dir = TempDir::new().unwrap();
    let storing = Build::new(dir.path(), &[":removed"]);
    let step = tessera_graph::value(TransformStep::new(
        suffix_transform(&storing, "classes", false),
        Some(storing.services_of(":removed")),
        Arc::new(tessera_transform::FixedUpstreamDependencies::not_required()),
        &storing.build_workspace(),
    ));
    let buffer = store(&storing, &step).unwrap();

    let loading = Build::new(dir.path(), &[":app"]);
    let err = load(&loading, &buffer).unwrap_err();
    assert!(matches!(err, CodecError::Unknown { kind: "project", ref name } if name == ":removed"));
}

#[test]
fn unresolvable_upstream_dependencies_fail_the_store() {
    let dir = TempDir::new().unwrap();
    let build = Build::new(dir.path(), &[":app"]);
    let step = tessera_graph::value(TransformStep::new(
        suffix_transform(&build, "min", true),
        Some(build.services_of(":app")),
        Arc::new(ResolvingUpstreamDependencies::new(
            ":app:runtimeClasspath",
            "Suffix(min)",
            || Err("could not resolve org.example:missing:1.0".into()),
        )),
        &build.build_workspace(),
    ));
    let err = store(&build, &step).unwrap_err();
    match err {
        CodecError::Callback { class, method, source } => {
            assert_eq!(class, "Suffix(min)");
            assert_eq!(method, "computeArtifacts");
            assert!(source.to_string().contains("org.example:missing:1.0"));
        }
        other => panic!("expected a callback failure, got {other:?}"),
    }
}
