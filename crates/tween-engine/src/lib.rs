pub mod api;
pub mod core;
pub mod systems;
pub mod extensions;

// Re-export key types at crate root for convenience
pub use crate::api::config::SchedulerConfig;
pub use crate::api::error::SchedulerError;
pub use crate::api::types::{BatchHandle, Color, ObjectHandle, TaskHandle, TimeDomain};
pub use crate::core::arena::{TransformArena, TransformStore};
pub use crate::core::frame::FrameLoop;
pub use crate::core::scheduler::Scheduler;
pub use crate::core::time::{Clock, FixedTimestep, Now};
pub use crate::systems::batch::{BatchRunner, MoveRequest, MoveTarget, TimeWindow};
pub use crate::systems::tasks::{FinishFn, TIME_EPSILON};

pub use crate::extensions::{ease, lerp, Easing, EasingCurve, Lerp};
