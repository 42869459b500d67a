//! Authentication scope hints
//!
//! Hints are registered before the first request of an operation so the
//! token fetched on the initial challenge already covers every action the
//! operation may need.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthAction {
    Pull,
    Push,
    Delete,
}

impl AuthAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthAction::Pull => "pull",
            AuthAction::Push => "push",
            AuthAction::Delete => "delete",
        }
    }
}

impl fmt::Display for AuthAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered set of actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeHint(Vec<AuthAction>);

impl ScopeHint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action; returns false if it was already present
    pub fn insert(&mut self, action: AuthAction) -> bool {
        if self.0.contains(&action) {
            return false;
        }
        self.0.push(action);
        true
    }

    pub fn contains(&self, action: AuthAction) -> bool {
        self.0.contains(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = AuthAction> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<AuthAction> for ScopeHint {
    fn from_iter<I: IntoIterator<Item = AuthAction>>(iter: I) -> Self {
        let mut hint = ScopeHint::new();
        hint.extend(iter);
        hint
    }
}

impl Extend<AuthAction> for ScopeHint {
    fn extend<I: IntoIterator<Item = AuthAction>>(&mut self, iter: I) {
        for action in iter {
            self.insert(action);
        }
    }
}

/// Whether the registry serves the referrers API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferrersSupport {
    Supported,
    Unsupported,
    #[default]
    Unknown,
}

impl From<Option<bool>> for ReferrersSupport {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => ReferrersSupport::Supported,
            Some(false) => ReferrersSupport::Unsupported,
            None => ReferrersSupport::Unknown,
        }
    }
}

/// Actions needed to delete a manifest
///
/// Without a referrers API the client may have to rewrite the referrers
/// tag index of the manifest's subject, which needs push. Unknown support
/// is treated as unsupported.
pub fn delete_scope_hints(referrers: ReferrersSupport) -> ScopeHint {
    let mut hints: ScopeHint = [AuthAction::Pull, AuthAction::Push, AuthAction::Delete]
        .into_iter()
        .collect();
    if referrers != ReferrersSupport::Supported {
        hints.insert(AuthAction::Push);
    }
    hints
}

/// Token scope string for a repository, e.g. `repository:foo/bar:pull,push`
pub fn repository_scope(repository: &str, hint: &ScopeHint) -> String {
    let actions: Vec<&str> = hint.iter().map(|a| a.as_str()).collect();
    format!("repository:{}:{}", repository, actions.join(","))
}
