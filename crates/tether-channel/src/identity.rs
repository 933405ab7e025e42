//! Session identity allocation.
//!
//! Unique identities are random UUIDs, retried while the collision checker
//! reports the candidate as already present in the shared namespace. The
//! check happens at creation time only; nothing reserves the name between
//! the check and the control block's creation.

use tether_core::{CollisionCheck, SessionId};
use tracing::debug;
use uuid::Uuid;

use crate::error::ChannelError;

/// Pick the identity for a new session.
///
/// With `fixed` set, returns [`SessionId::fixed`] without consulting the
/// checker. Otherwise draws up to `max_attempts` random candidates.
pub fn allocate_identity<C>(
    fixed: bool,
    checker: &C,
    max_attempts: u32,
) -> Result<SessionId, ChannelError>
where
    C: CollisionCheck + ?Sized,
{
    allocate_identity_with(fixed, checker, max_attempts, || {
        SessionId::new(Uuid::new_v4().to_string())
    })
}

/// [`allocate_identity`] with an explicit candidate generator.
pub fn allocate_identity_with<C, G>(
    fixed: bool,
    checker: &C,
    max_attempts: u32,
    mut generate: G,
) -> Result<SessionId, ChannelError>
where
    C: CollisionCheck + ?Sized,
    G: FnMut() -> SessionId,
{
    if fixed {
        return Ok(SessionId::fixed());
    }
    for attempt in 1..=max_attempts {
        let candidate = generate();
        if !checker.is_taken(&candidate) {
            return Ok(candidate);
        }
        debug!(identity = %candidate, attempt, "identity already in use, retrying");
    }
    Err(ChannelError::IdentityExhausted {
        attempts: max_attempts,
    })
}
