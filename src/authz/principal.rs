use std::collections::HashSet;

/// Permission codes held by the current session, as last reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub permissions: HashSet<String>,
}

impl Principal {
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(code)
    }

    /// True when at least one of `codes` is held. An empty `codes` is never satisfied.
    pub fn has_any<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        codes.iter().any(|code| self.has_permission(code.as_ref()))
    }

    pub fn has_all<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        codes.iter().all(|code| self.has_permission(code.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}
