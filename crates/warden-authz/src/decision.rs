use std::collections::BTreeSet;

/// Collects allow and deny grants for one resource across every matching policy.
///
/// Deny overrides allow: an operation that was denied by any policy is never
/// reported as allowed, regardless of how many policies allow it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GrantAccumulator {
    allowed: BTreeSet<String>,
    denied: BTreeSet<String>,
}

impl GrantAccumulator {
    pub fn allow(&mut self, operation: &str) {
        self.allowed.insert(operation.to_string());
    }

    pub fn deny(&mut self, operation: &str) {
        self.denied.insert(operation.to_string());
    }

    pub fn is_denied(&self, operation: &str) -> bool {
        self.denied.contains(operation)
    }

    pub fn is_allowed(&self, operation: &str) -> bool {
        self.allowed.contains(operation) && !self.denied.contains(operation)
    }

    /// True when every listed operation is allowed. An empty list is never allowed.
    pub fn allows_all<S: AsRef<str>>(&self, operations: &[S]) -> bool {
        !operations.is_empty() && operations.iter().all(|op| self.is_allowed(op.as_ref()))
    }

    /// Effective allowed operations, sorted.
    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed
            .iter()
            .filter(|op| !self.denied.contains(*op))
            .map(String::as_str)
    }

    /// Drop allowed operations rejected by `keep`. Denies are left untouched.
    pub fn retain_allowed(&mut self, keep: impl Fn(&str) -> bool) {
        self.allowed.retain(|op| keep(op.as_str()));
    }
}
