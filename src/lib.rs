pub mod core;
pub mod services;

pub use crate::core::config::{Config, GenerationMode};
pub use crate::core::error::{PlanError, ServiceError};
pub use crate::core::plan::{CreativeBrief, CreativePlan, MediaKind};
pub use crate::core::state::{ChainState, Stage};
pub use crate::services::planner::{PlanOrchestrator, PlanRun, PlannerOptions};
