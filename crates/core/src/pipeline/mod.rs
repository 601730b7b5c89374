//! Pipeline building: from a catalog format and extracted sources to a
//! declarative [`PipelineSpec`] the engine supervisor can run.

mod builder;
mod select;
mod types;

pub use builder::{build_pipeline, title_from_url};
pub use select::{best_passthrough, plan_sources, target_codec, SelectError, SourcePlan};
pub use types::{OutputMetadata, PipelineSpec, StreamMap, TargetCodec};
