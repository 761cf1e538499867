#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod scene;
pub mod query;
pub mod prune;
pub mod classify;
pub mod extract;
pub mod weights;
pub mod transfer;
pub mod pipeline;
pub mod settings;
pub mod audit;
pub mod utils;

pub use errors::{Result, RigError};
pub use scene::{Node, NodeHandle, NodeKind, Scene, SceneDescription, SceneGraph};
pub use prune::{Keep, PrunePlan, PruneStep};
pub use classify::BindSet;
pub use pipeline::{ExtractionContext, ExtractionSummary, Pipeline};
pub use settings::ExtractSettings;
pub use transfer::{TransferOutput, TransferReport};
pub use utils::names::NameIndex;
