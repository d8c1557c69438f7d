//! # unity_prep
//!
//! Consolidation of supernova light-curve fits into a single dataset for a hierarchical
//! standardization fit.
//!
//! Fits from several surveys ([`catalog`]) are converted to magnitudes with propagated
//! covariances ([`conversion`]), joined with redshifts and host-galaxy properties ([`merger`]),
//! deduplicated ([`dedup`]), cut ([`quality_cut`]), re-centered ([`normalize`]) and finally
//! projected into the marginal views consumed by the sampler ([`projector`], [`sampler`]).
//! [`pipeline::run`] chains every stage.
pub mod catalog;
pub mod constants;
pub mod conversion;
pub mod covariance;
pub mod dataset;
pub mod dedup;
pub mod merger;
pub mod metadata;
pub mod normalize;
pub mod pipeline;
pub mod prep_errors;
pub mod projector;
pub mod quality_cut;
pub mod record;
pub mod redshift;
pub mod sampler;

pub use dataset::{ConsolidatedDataset, DatasetState};
pub use prep_errors::PrepError;
pub use record::{ObjectRecord, Schema};
