//! Artifact transform chains and their cache codecs.
//!
//! A [`TransformedArtifactSet`] holds one [`TransformStepNode`] per source
//! artifact. Each node runs a [`TransformStep`], which applies a
//! [`Transform`] on behalf of its owning project. Steps and transforms hold
//! live services: the owning [`ProjectServices`], the [`TransformAction`]
//! and an upstream dependency resolver.
//!
//! The codecs in [`codec`] write only what identifies these nodes. On
//! decode, services are looked up again through [`ProjectLookup`] and
//! [`BuildServices`], and upstream dependencies come back as the file list
//! they resolved to when the graph was stored.

#![warn(missing_docs)]

pub mod attributes;
pub mod codec;
pub mod dependencies;
pub mod error;
pub mod model;
pub mod services;

pub use attributes::{AttributeContainer, Capability};
pub use codec::transform_bindings;
pub use dependencies::{
    FixedUpstreamDependencies, ResolvingUpstreamDependencies, TransformDependencies,
    TransformUpstreamDependencies,
};
pub use error::{TransformError, TransformResult};
pub use model::{
    StepInput, Transform, TransformChain, TransformStep, TransformStepNode, TransformedArtifactSet,
};
pub use services::{BuildServices, ProjectLookup, ProjectServices, TransformAction};
