//! Cache codecs for transform chains.
//!
//! Transforms, steps, chains, nodes and artifact sets are written once per
//! stream and back-referenced afterwards. Live services are never written:
//! a step records the identity path of its owning project and a transform
//! the name of its action, and decoding looks both up in the current build.
//! Upstream dependencies are resolved while encoding and come back as a
//! [`FixedUpstreamDependencies`].

use crate::attributes::{AttributeContainer, Capability};
use crate::dependencies::{FixedUpstreamDependencies, TransformDependencies};
use crate::error::TransformError;
use crate::model::{
    StepInput, Transform, TransformChain, TransformStep, TransformStepNode, TransformedArtifactSet,
};
use crate::services::{BuildServices, ProjectLookup, ProjectServices};
use std::path::PathBuf;
use std::sync::Arc;
use tessera_common::ProjectPath;
use tessera_graph::{
    BindingsBuilder, Codec, CodecError, CodecResult, ObjectRef, ReadContext, WriteContext,
};
use tracing::debug;

const INITIAL_NODE: u8 = 0;
const CHAINED_NODE: u8 = 1;

/// Appends the transform codecs to `builder`.
pub fn transform_bindings(
    builder: BindingsBuilder,
    projects: Arc<dyn ProjectLookup>,
    services: Arc<dyn BuildServices>,
) -> BindingsBuilder {
    builder
        .bind::<Transform, _>(TransformCodec {
            services: Arc::clone(&services),
        })
        .bind::<TransformStep, _>(TransformStepCodec { projects, services })
        .bind::<TransformChain, _>(TransformChainCodec)
        .bind::<TransformStepNode, _>(TransformStepNodeCodec)
        .bind::<TransformedArtifactSet, _>(TransformedArtifactSetCodec)
}

/// Writes the registration of a transform; the action is looked up by
/// implementation name on decode.
pub struct TransformCodec {
    services: Arc<dyn BuildServices>,
}

impl Codec<Arc<Transform>> for TransformCodec {
    fn encode(&self, ctx: &mut WriteContext, transform: &Arc<Transform>) -> CodecResult<()> {
        let obj: ObjectRef = transform.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_string(&transform.implementation)?;
            ctx.write_string(&transform.display_name)?;
            ctx.write_serde(&transform.from_attributes)?;
            ctx.write_serde(&transform.to_attributes)?;
            ctx.write_bool(transform.requires_dependencies)?;
            let trace = ctx.trace().bean(transform.implementation.as_str()).field("parameters");
            ctx.with_property_trace(trace, |ctx| ctx.write_value(&transform.parameters))
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<Transform>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let implementation = ctx.read_string()?;
            let display_name = ctx.read_string()?;
            let from_attributes: AttributeContainer = ctx.read_serde()?;
            let to_attributes: AttributeContainer = ctx.read_serde()?;
            let requires_dependencies = ctx.read_bool()?;
            let trace = ctx.trace().bean(implementation.as_str()).field("parameters");
            let parameters = ctx.with_property_trace(trace, |ctx| ctx.read_value())?;
            let action = self
                .services
                .transform_action(&implementation)
                .ok_or_else(|| CodecError::Unknown {
                    kind: "transform action",
                    name: implementation.clone(),
                })?;
            Ok(Arc::new(Transform {
                implementation,
                display_name,
                from_attributes,
                to_attributes,
                requires_dependencies,
                parameters,
                action,
            }))
        })
    }
}

/// Writes a step as its owning project path, its transform and its
/// resolved upstream dependencies.
pub struct TransformStepCodec {
    projects: Arc<dyn ProjectLookup>,
    services: Arc<dyn BuildServices>,
}

impl Codec<Arc<TransformStep>> for TransformStepCodec {
    fn encode(&self, ctx: &mut WriteContext, step: &Arc<TransformStep>) -> CodecResult<()> {
        let obj: ObjectRef = step.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            let owner = step.owner().map(|project| project.identity_path().as_str());
            ctx.write_optional_string(owner)?;
            let transform: ObjectRef = step.transform().clone();
            ctx.write_object(&transform)?;
            let dependencies = step.dependencies().map_err(|err| callback_failure(step, err))?;
            ctx.write_serde(&dependencies)
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<TransformStep>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let owner = match ctx.read_optional_string()? {
                Some(path) => Some(self.project(&path)?),
                None => None,
            };
            let transform = ctx.read_object_as::<Transform>()?;
            let dependencies: TransformDependencies = ctx.read_serde()?;
            debug!(
                transform = %transform.display_name,
                owner = ?owner.as_ref().map(|project| project.identity_path()),
                "binding restored transform step to current build"
            );
            Ok(Arc::new(TransformStep::new(
                transform,
                owner,
                Arc::new(FixedUpstreamDependencies::new(dependencies)),
                &self.services.build_workspace(),
            )))
        })
    }
}

impl TransformStepCodec {
    fn project(&self, path: &str) -> CodecResult<Arc<ProjectServices>> {
        let identity_path = ProjectPath::parse(path).map_err(|err| CodecError::Malformed {
            reason: err.to_string(),
        })?;
        self.projects
            .project(&identity_path)
            .ok_or_else(|| CodecError::Unknown {
                kind: "project",
                name: identity_path.to_string(),
            })
    }
}

fn callback_failure(step: &TransformStep, err: TransformError) -> CodecError {
    CodecError::Callback {
        class: step.transform().display_name.clone(),
        method: "computeArtifacts",
        source: Box::new(err),
    }
}

/// Writes a chain as its optional initial chain followed by its last step.
pub struct TransformChainCodec;

impl Codec<Arc<TransformChain>> for TransformChainCodec {
    fn encode(&self, ctx: &mut WriteContext, chain: &Arc<TransformChain>) -> CodecResult<()> {
        let obj: ObjectRef = chain.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_value(&chain.init().map(|init| -> ObjectRef { init.clone() }))?;
            let step: ObjectRef = chain.step().clone();
            ctx.write_object(&step)
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<TransformChain>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let init = ctx.read_value_as::<TransformChain>()?;
            let step = ctx.read_object_as::<TransformStep>()?;
            Ok(Arc::new(TransformChain::new(init, step)))
        })
    }
}

/// Writes a node as its id, its input and its step. Outputs are not written.
pub struct TransformStepNodeCodec;

impl Codec<Arc<TransformStepNode>> for TransformStepNodeCodec {
    fn encode(&self, ctx: &mut WriteContext, node: &Arc<TransformStepNode>) -> CodecResult<()> {
        let obj: ObjectRef = node.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_u64(node.id())?;
            match node.input() {
                StepInput::Initial { artifact } => {
                    ctx.write_u8(INITIAL_NODE)?;
                    ctx.write_string(&artifact.to_string_lossy())?;
                }
                StepInput::Chained { previous } => {
                    ctx.write_u8(CHAINED_NODE)?;
                    let previous: ObjectRef = previous.clone();
                    ctx.write_object(&previous)?;
                }
            }
            let step: ObjectRef = node.step().clone();
            ctx.write_object(&step)
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<TransformStepNode>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let id = ctx.read_u64()?;
            let input = match ctx.read_u8()? {
                INITIAL_NODE => StepInput::Initial {
                    artifact: PathBuf::from(ctx.read_string()?),
                },
                CHAINED_NODE => StepInput::Chained {
                    previous: ctx.read_object_as::<TransformStepNode>()?,
                },
                tag => {
                    return Err(CodecError::Malformed {
                        reason: format!("invalid transform node kind {tag}"),
                    })
                }
            };
            let step = ctx.read_object_as::<TransformStep>()?;
            Ok(Arc::new(TransformStepNode::new(id, input, step)))
        })
    }
}

/// Writes an artifact set as its variant description and its nodes.
pub struct TransformedArtifactSetCodec;

impl Codec<Arc<TransformedArtifactSet>> for TransformedArtifactSetCodec {
    fn encode(&self, ctx: &mut WriteContext, set: &Arc<TransformedArtifactSet>) -> CodecResult<()> {
        let obj: ObjectRef = set.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_string(&set.component)?;
            ctx.write_serde(&set.target_attributes)?;
            ctx.write_serde(&set.capabilities)?;
            ctx.write_len(set.nodes.len())?;
            for node in &set.nodes {
                let node: ObjectRef = node.clone();
                ctx.write_object(&node)?;
            }
            Ok(())
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<TransformedArtifactSet>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let component = ctx.read_string()?;
            let target_attributes: AttributeContainer = ctx.read_serde()?;
            let capabilities: Vec<Capability> = ctx.read_serde()?;
            let len = ctx.read_len()?;
            let mut nodes = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                nodes.push(ctx.read_object_as::<TransformStepNode>()?);
            }
            Ok(Arc::new(TransformedArtifactSet {
                component,
                target_attributes,
                capabilities,
                nodes,
            }))
        })
    }
}
