use relay_core::{Message, Role, UsageStats};

/// Running token totals for one conversation.
///
/// Only the owning session can fold into it, and only while appending the
/// assistant message the usage belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageAggregator {
    totals: UsageStats,
}

impl UsageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals implied by a history: the field-wise sum of assistant usage.
    pub fn from_history(history: &[Message]) -> Self {
        let totals = history
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .filter_map(|m| m.usage)
            .fold(UsageStats::ZERO, |acc, usage| acc + usage);
        Self { totals }
    }

    pub fn totals(&self) -> UsageStats {
        self.totals
    }

    pub(crate) fn fold(&mut self, usage: UsageStats) {
        self.totals += usage;
    }

    pub(crate) fn clear(&mut self) {
        self.totals = UsageStats::ZERO;
    }
}
