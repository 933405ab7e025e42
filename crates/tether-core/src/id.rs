//! Strongly-typed identifiers for sessions and payload generations.

use std::fmt;

/// Well-known identity used in single-session (debug) mode.
pub const DEFAULT_IDENTITY: &str = "default";

/// Opaque token naming one channel session.
///
/// The control block is named by the identity itself; every payload
/// region derives its name from the identity and its [`Generation`]
/// (see [`payload_name`](SessionId::payload_name)).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an arbitrary token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The fixed [`DEFAULT_IDENTITY`] session.
    pub fn fixed() -> Self {
        Self(DEFAULT_IDENTITY.to_owned())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the payload region for `generation`.
    ///
    /// The remote side derives the same name independently: the identity
    /// followed by one underscore per generation. Generation 0 therefore
    /// shares its name with the identity.
    ///
    /// ```
    /// use tether_core::{Generation, SessionId};
    ///
    /// let id = SessionId::new("env");
    /// assert_eq!(id.payload_name(Generation(0)), "env");
    /// assert_eq!(id.payload_name(Generation(3)), "env___");
    /// ```
    pub fn payload_name(&self, generation: Generation) -> String {
        let suffix = usize::try_from(generation.0).unwrap_or(usize::MAX);
        let mut name = String::with_capacity(self.0.len() + suffix.min(64));
        name.push_str(&self.0);
        name.extend(std::iter::repeat('_').take(suffix));
        name
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(v: &str) -> Self {
        Self(v.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Payload region generation.
///
/// Owned by the control block and incremented exactly once every time the
/// payload region is recreated. A trainer-side handle whose generation is
/// behind the control block's points at a region that may already be gone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation immediately after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Generation {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
