pub mod anchors;
pub mod budget;
pub mod compactor;
pub mod error;
pub mod injection;
pub mod noise;
pub mod topics;

pub use anchors::{Anchor, AnchorType, ContinuityAnchors};
pub use budget::{BudgetReport, ContextBudgetAllocator, PoolReport, Tier};
pub use compactor::Compactor;
pub use error::{ContextError, Result};
pub use injection::{render_recall_block, strip_previous_injection, Injection};
pub use noise::NoiseFilter;
pub use topics::{TopicRecord, TopicTracker};
