//! Readiness cookies.
//!
//! Every eligible sensor receives a fresh cookie per readiness round and must
//! echo it back before the session starts any hardware.

use crate::error::SessionError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Largest cookie value handed to drivers (drivers store cookies as signed ints).
pub const MAX_COOKIE: u32 = i32::MAX as u32;

/// Single-use, non-zero correlation value for one sensor in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Cookie(NonZeroU32);

impl Cookie {
    /// Returns `None` for zero, which is never a valid cookie.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for Cookie {
    type Error = SessionError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Cookie::new(raw).ok_or(SessionError::InvalidCookie(raw))
    }
}

impl From<Cookie> for u32 {
    fn from(cookie: Cookie) -> Self {
        cookie.get()
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of cookies for readiness rounds.
pub trait CookieGenerator: Send {
    fn next_cookie(&mut self) -> Cookie;
}

impl<G: CookieGenerator + ?Sized> CookieGenerator for Box<G> {
    fn next_cookie(&mut self) -> Cookie {
        (**self).next_cookie()
    }
}

/// Unpredictable cookies in `1..=MAX_COOKIE`.
pub struct RandomCookies {
    rng: StdRng,
}

impl RandomCookies {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible stream, for tests and simulations.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomCookies {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieGenerator for RandomCookies {
    fn next_cookie(&mut self) -> Cookie {
        let raw = self.rng.gen_range(1..=MAX_COOKIE);
        Cookie::new(raw).unwrap_or(Cookie(NonZeroU32::MIN))
    }
}

/// Deterministic cookies counting up from a start value, wrapping past
/// [`MAX_COOKIE`] back to 1.
#[derive(Debug, Clone)]
pub struct SequentialCookies {
    next: u32,
}

impl SequentialCookies {
    pub fn starting_at(start: u32) -> Self {
        Self {
            next: start.clamp(1, MAX_COOKIE),
        }
    }
}

impl Default for SequentialCookies {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl CookieGenerator for SequentialCookies {
    fn next_cookie(&mut self) -> Cookie {
        let raw = self.next;
        self.next = if raw >= MAX_COOKIE { 1 } else { raw + 1 };
        Cookie::new(raw).unwrap_or(Cookie(NonZeroU32::MIN))
    }
}
