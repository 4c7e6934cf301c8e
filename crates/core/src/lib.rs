pub mod asset;
pub mod changes;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod fqn;
pub mod ids;
pub mod index;
pub mod merge;
pub mod validate;
pub mod value;

pub use asset::{Asset, AssetType, MergedAsset, UnmergedAsset};
pub use changes::ChangeSet;
pub use config::EngineConfig;
pub use context::EngineContext;
pub use diff::{ChangeType, PropertyChange};
pub use error::CoreError;
pub use ids::*;
pub use index::AssetIndex;
pub use merge::{MergeResult, ResolutionError};
pub use validate::ValidationReport;
pub use value::{PropertyMap, PropertyValue};
