use serde::Deserialize;

/// What a multi-file operation does when one unit of work fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure and report it; unvisited work is skipped.
    FailFast,
    /// Record the failure and carry on with the remaining work.
    BestEffort,
}

impl FailurePolicy {
    pub fn is_fail_fast(self) -> bool {
        self == FailurePolicy::FailFast
    }
}
