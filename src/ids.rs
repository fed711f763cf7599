use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Index of a scope node inside an [`Engine`](crate::engine::Engine).
///
/// Scope `0` is always the root scope.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub(crate) usize);

impl ScopeId {
    /// The root scope every engine starts with.
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Index of a registered route inside an [`Engine`](crate::engine::Engine).
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub struct RouteId(pub(crate) usize);

impl RouteId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for RouteId {
    fn from(index: usize) -> Self {
        RouteId(index)
    }
}

impl Display for RouteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ScopeId::ROOT.to_string(), "scope#0");
        assert_eq!(RouteId(7).to_string(), "route#7");
    }
}
