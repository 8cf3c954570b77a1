use time::{Duration, OffsetDateTime};

/// Why a reset confirmation was refused. Each maps to a `token` field
/// message in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDenial {
    NeverRequested,
    Expired,
    Incorrect,
}

impl ResetDenial {
    pub fn message(self) -> &'static str {
        match self {
            Self::NeverRequested => "has never been requested",
            Self::Expired => "is expired",
            Self::Incorrect => "is incorrect",
        }
    }
}

/// Decide whether a submitted token consumes the pending reset.
///
/// Expiry is a direct elapsed-duration comparison against the injected
/// clock: a token issued at T is honored strictly inside (T, T+ttl) and
/// refused from T+ttl on. A negative elapsed time (clock skew) is refused
/// the same way. Refusals leave the pending state untouched.
pub fn check_pending(
    pending: Option<(&str, OffsetDateTime)>,
    submitted: &str,
    now: OffsetDateTime,
    ttl: Duration,
) -> Result<(), ResetDenial> {
    let (stored, sent_at) = pending.ok_or(ResetDenial::NeverRequested)?;
    let elapsed = now - sent_at;
    if elapsed < Duration::ZERO || elapsed >= ttl {
        return Err(ResetDenial::Expired);
    }
    if !constant_time_eq(submitted, stored) {
        return Err(ResetDenial::Incorrect);
    }
    Ok(())
}

/// Comparison time depends only on the submitted length, not on where the
/// first mismatching byte sits.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
