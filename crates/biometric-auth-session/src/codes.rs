//! Platform codes shared by sensors, the prompt surface and callers.
//!
//! Numeric values match the codes drivers and callers already exchange, so
//! each type converts losslessly to and from its raw integer form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Biometric modality of a single sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Fingerprint,
    Iris,
    Face,
}

impl Modality {
    /// Bit used for this modality in a [`ModalityMask`].
    pub const fn bit(self) -> u32 {
        match self {
            Modality::Fingerprint => 1 << 1,
            Modality::Iris => 1 << 2,
            Modality::Face => 1 << 3,
        }
    }

    /// Passive modalities leave the hardware idle after a rejection, so the
    /// prompt can offer a "try again" affordance instead of restarting.
    pub fn is_pausable(self) -> bool {
        matches!(self, Modality::Face | Modality::Iris)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modality::Fingerprint => "fingerprint",
            Modality::Iris => "iris",
            Modality::Face => "face",
        };
        f.write_str(name)
    }
}

/// Bitmask of modalities, as reported to the prompt surface and caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModalityMask(u32);

impl ModalityMask {
    /// No biometric modality (credential-only prompt, rejection signal).
    pub const NONE: ModalityMask = ModalityMask(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, modality: Modality) -> bool {
        self.0 & modality.bit() != 0
    }

    pub fn with(self, modality: Modality) -> Self {
        Self(self.0 | modality.bit())
    }
}

impl From<Modality> for ModalityMask {
    fn from(modality: Modality) -> Self {
        Self(modality.bit())
    }
}

impl FromIterator<Modality> for ModalityMask {
    fn from_iter<I: IntoIterator<Item = Modality>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

impl fmt::Display for ModalityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Security class of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStrength {
    /// Trusted to unlock secure key storage directly.
    Strong,
    Weak,
    Convenience,
}

impl SensorStrength {
    pub fn is_strong(self) -> bool {
        matches!(self, SensorStrength::Strong)
    }
}

/// Error codes reported by sensor drivers and delivered to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricError {
    HwUnavailable,
    UnableToProcess,
    Timeout,
    NoSpace,
    Canceled,
    UnableToRemove,
    Lockout,
    Vendor,
    LockoutPermanent,
    UserCanceled,
    NoBiometrics,
    HwNotPresent,
    NegativeButton,
    NoDeviceCredential,
    /// Relayed to the surface when a passive modality rejects an attempt.
    PausedRejected,
    /// Any code this crate does not name, carried verbatim.
    Other(i32),
}

impl BiometricError {
    pub fn code(self) -> i32 {
        match self {
            BiometricError::HwUnavailable => 1,
            BiometricError::UnableToProcess => 2,
            BiometricError::Timeout => 3,
            BiometricError::NoSpace => 4,
            BiometricError::Canceled => 5,
            BiometricError::UnableToRemove => 6,
            BiometricError::Lockout => 7,
            BiometricError::Vendor => 8,
            BiometricError::LockoutPermanent => 9,
            BiometricError::UserCanceled => 10,
            BiometricError::NoBiometrics => 11,
            BiometricError::HwNotPresent => 12,
            BiometricError::NegativeButton => 13,
            BiometricError::NoDeviceCredential => 14,
            BiometricError::PausedRejected => 100,
            BiometricError::Other(code) => code,
        }
    }

    /// Temporary or permanent lockout; the only errors that pivot a running
    /// session to device credential.
    pub fn is_lockout(self) -> bool {
        matches!(
            self,
            BiometricError::Lockout | BiometricError::LockoutPermanent
        )
    }
}

impl From<i32> for BiometricError {
    fn from(code: i32) -> Self {
        match code {
            1 => BiometricError::HwUnavailable,
            2 => BiometricError::UnableToProcess,
            3 => BiometricError::Timeout,
            4 => BiometricError::NoSpace,
            5 => BiometricError::Canceled,
            6 => BiometricError::UnableToRemove,
            7 => BiometricError::Lockout,
            8 => BiometricError::Vendor,
            9 => BiometricError::LockoutPermanent,
            10 => BiometricError::UserCanceled,
            11 => BiometricError::NoBiometrics,
            12 => BiometricError::HwNotPresent,
            13 => BiometricError::NegativeButton,
            14 => BiometricError::NoDeviceCredential,
            100 => BiometricError::PausedRejected,
            other => BiometricError::Other(other),
        }
    }
}

impl fmt::Display for BiometricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Why the prompt surface went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissedReason {
    BiometricConfirmed,
    /// The user pressed the negative ("use another way") button.
    Negative,
    UserCancel,
    BiometricConfirmNotRequired,
    Error,
    ServerRequested,
    CredentialConfirmed,
    Unknown(i32),
}

impl DismissedReason {
    pub fn code(self) -> i32 {
        match self {
            DismissedReason::BiometricConfirmed => 1,
            DismissedReason::Negative => 2,
            DismissedReason::UserCancel => 3,
            DismissedReason::BiometricConfirmNotRequired => 4,
            DismissedReason::Error => 5,
            DismissedReason::ServerRequested => 6,
            DismissedReason::CredentialConfirmed => 7,
            DismissedReason::Unknown(code) => code,
        }
    }
}

impl From<i32> for DismissedReason {
    fn from(code: i32) -> Self {
        match code {
            1 => DismissedReason::BiometricConfirmed,
            2 => DismissedReason::Negative,
            3 => DismissedReason::UserCancel,
            4 => DismissedReason::BiometricConfirmNotRequired,
            5 => DismissedReason::Error,
            6 => DismissedReason::ServerRequested,
            7 => DismissedReason::CredentialConfirmed,
            other => DismissedReason::Unknown(other),
        }
    }
}

/// How the user ultimately authenticated, reported with a success result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationType {
    DeviceCredential,
    Biometric,
}

impl AuthenticationType {
    pub fn code(self) -> i32 {
        match self {
            AuthenticationType::DeviceCredential => 1,
            AuthenticationType::Biometric => 2,
        }
    }

    /// Result type implied by a successful dismissal, `None` for reasons that
    /// are not successes.
    pub fn for_dismissal(reason: DismissedReason) -> Option<Self> {
        match reason {
            DismissedReason::CredentialConfirmed => Some(AuthenticationType::DeviceCredential),
            DismissedReason::BiometricConfirmed | DismissedReason::BiometricConfirmNotRequired => {
                Some(AuthenticationType::Biometric)
            }
            _ => None,
        }
    }
}

/// Allowed-authenticators policy carried in the prompt request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authenticators(u32);

impl Authenticators {
    pub const BIOMETRIC_STRONG: Authenticators = Authenticators(0x000F);
    pub const BIOMETRIC_WEAK: Authenticators = Authenticators(0x00FF);
    pub const BIOMETRIC_CONVENIENCE: Authenticators = Authenticators(0x0FFF);
    pub const DEVICE_CREDENTIAL: Authenticators = Authenticators(1 << 15);

    /// Every bit below the device-credential bit describes a biometric strength.
    const BIOMETRIC_MIN_STRENGTH: u32 = 0x7FFF;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Authenticators) -> Self {
        Self(self.0 | other.0)
    }

    pub fn allows_device_credential(self) -> bool {
        self.0 & Self::DEVICE_CREDENTIAL.0 != 0
    }

    pub fn allows_biometric(self) -> bool {
        self.0 & Self::BIOMETRIC_MIN_STRENGTH != 0
    }

    pub fn without_biometrics(self) -> Self {
        Self(self.0 & !Self::BIOMETRIC_MIN_STRENGTH)
    }
}
