//! Legend assembly: placeholders, per-type entry generators and their asynchronous enrichment.

pub mod engine;
pub mod entry;
pub mod error;
pub mod feature_count;
pub mod generators;
pub mod layer;
pub mod remote;
pub mod runtime;
pub mod symbology;
pub mod visibility;

pub use engine::LegendEngine;
pub use entry::{EntryId, LegendEntry};
pub use error::LegendError;
pub use layer::{LayerData, LayerLegend, LayerRecord, MapLayer};
pub use runtime::LegendServices;
