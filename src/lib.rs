pub mod ability_id;
pub mod build_metadata;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod rotation;
mod serde_defaults;
pub mod settings;
pub mod store;
pub mod taxonomy;
#[cfg(test)]
mod test_support;

pub use ability_id::{canonical_icon_url, AbilityIdResolver, Resolution, ResolutionSource};
pub use build_metadata::{merge, merge_with_summary, BuildMetadataRecord, BuildMetadataTable, MergeSummary};
pub use error::StoreError;
pub use pipeline::{ingest_artifacts, run, IngestOutcome, RunReport};
pub use rotation::{ArtifactFormat, CastSequence, CastSequenceParser, ParsedArtifact};
pub use settings::{NormalizerSettings, ParseSettings};
