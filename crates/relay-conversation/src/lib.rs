pub mod aggregator;
pub mod session;

pub use aggregator::UsageAggregator;
pub use session::{ConversationSession, SessionSummary};
