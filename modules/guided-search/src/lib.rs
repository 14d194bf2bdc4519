pub mod flow;
pub mod guidance;
pub mod render;
pub mod store;
pub mod sync;

pub use flow::{selection_for, GuidanceCoordinator, GuidanceTicket, SearchFlow};
pub use guidance::{Guidance, GuidanceError, GuidanceSession, ReplyMode};
pub use store::SearchStore;
