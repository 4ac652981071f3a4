//! Biometric authentication session.
//!
//! An [`AuthSession`] drives one authentication attempt across the sensors in
//! an [`EligibilitySnapshot`], with optional fallback to device credential:
//!
//! 1. Every eligible sensor is armed with a fresh [`Cookie`].
//! 2. Once all cookies are returned, the sensors start and the prompt is shown.
//! 3. Sensor and prompt events move the session between states until exactly
//!    one terminal result reaches the [`ResultReceiver`].
//!
//! The session is synchronous and not reentrant. Owners serialize events into
//! it (see the `auth-session-runtime` crate).

pub mod codes;
pub mod collaborators;
pub mod cookie;
pub mod eligibility;
pub mod error;
pub mod recording;
pub mod request;
pub mod sensor;
pub mod session;

pub use codes::{
    AuthenticationType, Authenticators, BiometricError, DismissedReason, Modality, ModalityMask,
    SensorStrength,
};
pub use collaborators::{
    Collaborators, PresentationSurface, ResultReceiver, ShowPromptRequest, TokenStore,
};
pub use cookie::{Cookie, CookieGenerator, RandomCookies, SequentialCookies, MAX_COOKIE};
pub use eligibility::EligibilitySnapshot;
pub use error::{RemoteError, RemoteResult, SessionError, SessionResult};
pub use request::{CallerIdentity, PromptInfo, SessionRequest};
pub use sensor::{
    ArmRequest, BiometricSensor, SensorDriver, SensorId, SensorInput, SensorMachine, SensorPhase,
    SensorState,
};
pub use session::{
    AuthSession, SensorSnapshot, SessionPhase, SessionProgress, SessionSnapshot, SessionState,
};

#[cfg(test)]
mod tests;
