//! Ledger status machines.
//!
//! Settlement, burial and claim records each carry a status advanced by
//! external workers. Statuses keep their integer wire codes for storage, but
//! code should branch on the enum. Error codes are independent absorbing
//! states: they are left only through [`LedgerStatus::recovery_state`], never
//! by arithmetic on the code. Code `0` is never a valid status.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Part of the forward sequence, not yet finished.
    Forward,
    /// End of the forward sequence; the record is eligible for cleanup.
    Terminal,
    /// Absorbing failure state awaiting explicit recovery.
    Error,
}

/// Behaviour shared by all ledger status enums.
pub trait LedgerStatus: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Human-readable name of the status family, used in errors.
    const FAMILY: &'static str;

    /// Status assigned to a freshly constructed record.
    const INITIAL: Self;

    /// Every status in the family.
    const ALL: &'static [Self];

    /// Stored integer code.
    fn code(self) -> i32;

    /// Classification of this status.
    fn kind(self) -> StatusKind;

    /// Forward successor, if any.
    fn next(self) -> Option<Self>;

    /// Error state entered when the step in flight at this status fails.
    fn error_state(self) -> Option<Self>;

    /// Status to re-enter when recovering from this error state.
    fn recovery_state(self) -> Option<Self>;

    /// Parse a stored integer code.
    fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.code() == code)
            .ok_or(Error::InvalidStatus {
                kind: Self::FAMILY,
                value: code,
            })
    }

    /// Whether a direct transition to `to` is declared.
    fn can_transition_to(self, to: Self) -> bool {
        self.next() == Some(to) || self.error_state() == Some(to) || self.recovery_state() == Some(to)
    }

    fn is_terminal(self) -> bool {
        self.kind() == StatusKind::Terminal
    }

    fn is_error(self) -> bool {
        self.kind() == StatusKind::Error
    }
}

// =============================================================================
// Broker-to-broker settlement
// =============================================================================

/// Payment status of a broker-to-broker settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    AlphaPending,
    AlphaConfirmed,
    GasPending,
    GasConfirmed,
    BetaPending,
    BetaConfirmed,
    AlphaError,
    GasError,
    BetaError,
}

impl LedgerStatus for PaymentStatus {
    const FAMILY: &'static str = "payment status";
    const INITIAL: Self = Self::AlphaPending;
    const ALL: &'static [Self] = &[
        Self::AlphaPending,
        Self::AlphaConfirmed,
        Self::GasPending,
        Self::GasConfirmed,
        Self::BetaPending,
        Self::BetaConfirmed,
        Self::AlphaError,
        Self::GasError,
        Self::BetaError,
    ];

    fn code(self) -> i32 {
        match self {
            Self::AlphaPending => 1,
            Self::AlphaConfirmed => 2,
            Self::GasPending => 3,
            Self::GasConfirmed => 4,
            Self::BetaPending => 5,
            Self::BetaConfirmed => 6,
            Self::AlphaError => -1,
            Self::GasError => -2,
            Self::BetaError => -4,
        }
    }

    fn kind(self) -> StatusKind {
        match self {
            Self::BetaConfirmed => StatusKind::Terminal,
            Self::AlphaError | Self::GasError | Self::BetaError => StatusKind::Error,
            _ => StatusKind::Forward,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::AlphaPending => Some(Self::AlphaConfirmed),
            Self::AlphaConfirmed => Some(Self::GasPending),
            Self::GasPending => Some(Self::GasConfirmed),
            Self::GasConfirmed => Some(Self::BetaPending),
            Self::BetaPending => Some(Self::BetaConfirmed),
            _ => None,
        }
    }

    fn error_state(self) -> Option<Self> {
        match self {
            Self::AlphaPending => Some(Self::AlphaError),
            Self::GasPending => Some(Self::GasError),
            Self::BetaPending => Some(Self::BetaError),
            _ => None,
        }
    }

    fn recovery_state(self) -> Option<Self> {
        match self {
            Self::AlphaError => Some(Self::AlphaPending),
            Self::GasError => Some(Self::GasPending),
            Self::BetaError => Some(Self::BetaPending),
            _ => None,
        }
    }
}

// =============================================================================
// Treasure burial
// =============================================================================

/// Status of a treasure burial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrlStatus {
    Waiting,
    Pending,
    Confirmed,
    GasPending,
    GasConfirmed,
    BuryPending,
    BuryConfirmed,
    PrlError,
    GasError,
    BuryError,
}

impl LedgerStatus for PrlStatus {
    const FAMILY: &'static str = "burial status";
    const INITIAL: Self = Self::Waiting;
    const ALL: &'static [Self] = &[
        Self::Waiting,
        Self::Pending,
        Self::Confirmed,
        Self::GasPending,
        Self::GasConfirmed,
        Self::BuryPending,
        Self::BuryConfirmed,
        Self::PrlError,
        Self::GasError,
        Self::BuryError,
    ];

    fn code(self) -> i32 {
        match self {
            Self::Waiting => 1,
            Self::Pending => 2,
            Self::Confirmed => 3,
            Self::GasPending => 4,
            Self::GasConfirmed => 5,
            Self::BuryPending => 6,
            Self::BuryConfirmed => 7,
            Self::PrlError => -1,
            Self::GasError => -3,
            Self::BuryError => -5,
        }
    }

    fn kind(self) -> StatusKind {
        match self {
            Self::BuryConfirmed => StatusKind::Terminal,
            Self::PrlError | Self::GasError | Self::BuryError => StatusKind::Error,
            _ => StatusKind::Forward,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Pending),
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::GasPending),
            Self::GasPending => Some(Self::GasConfirmed),
            Self::GasConfirmed => Some(Self::BuryPending),
            Self::BuryPending => Some(Self::BuryConfirmed),
            _ => None,
        }
    }

    fn error_state(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::PrlError),
            Self::GasPending => Some(Self::GasError),
            Self::BuryPending => Some(Self::BuryError),
            _ => None,
        }
    }

    fn recovery_state(self) -> Option<Self> {
        match self {
            Self::PrlError => Some(Self::Pending),
            Self::GasError => Some(Self::GasPending),
            Self::BuryError => Some(Self::BuryPending),
            _ => None,
        }
    }
}

// =============================================================================
// Treasure claim: PRL track
// =============================================================================

/// Status of the PRL transfer of a treasure claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPrlStatus {
    NotStarted,
    Processing,
    Success,
    Error,
}

impl LedgerStatus for ClaimPrlStatus {
    const FAMILY: &'static str = "claim status";
    const INITIAL: Self = Self::NotStarted;
    const ALL: &'static [Self] = &[
        Self::NotStarted,
        Self::Processing,
        Self::Success,
        Self::Error,
    ];

    fn code(self) -> i32 {
        match self {
            Self::NotStarted => 1,
            Self::Processing => 2,
            Self::Success => 3,
            Self::Error => -1,
        }
    }

    fn kind(self) -> StatusKind {
        match self {
            Self::Success => StatusKind::Terminal,
            Self::Error => StatusKind::Error,
            _ => StatusKind::Forward,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Processing),
            Self::Processing => Some(Self::Success),
            _ => None,
        }
    }

    fn error_state(self) -> Option<Self> {
        match self {
            Self::Processing => Some(Self::Error),
            _ => None,
        }
    }

    fn recovery_state(self) -> Option<Self> {
        match self {
            Self::Error => Some(Self::Processing),
            _ => None,
        }
    }
}

// =============================================================================
// Treasure claim: gas track
// =============================================================================

/// Status of the gas funding (and leftover reclaim) of a treasure claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasTransferStatus {
    NotStarted,
    Processing,
    Success,
    LeftoversReclaimProcessing,
    LeftoversReclaimSuccess,
    Error,
    LeftoversReclaimError,
}

impl LedgerStatus for GasTransferStatus {
    const FAMILY: &'static str = "gas transfer status";
    const INITIAL: Self = Self::NotStarted;
    const ALL: &'static [Self] = &[
        Self::NotStarted,
        Self::Processing,
        Self::Success,
        Self::LeftoversReclaimProcessing,
        Self::LeftoversReclaimSuccess,
        Self::Error,
        Self::LeftoversReclaimError,
    ];

    fn code(self) -> i32 {
        match self {
            Self::NotStarted => 1,
            Self::Processing => 2,
            Self::Success => 3,
            Self::LeftoversReclaimProcessing => 4,
            Self::LeftoversReclaimSuccess => 5,
            Self::Error => -1,
            Self::LeftoversReclaimError => -2,
        }
    }

    fn kind(self) -> StatusKind {
        match self {
            Self::LeftoversReclaimSuccess => StatusKind::Terminal,
            Self::Error | Self::LeftoversReclaimError => StatusKind::Error,
            _ => StatusKind::Forward,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Processing),
            Self::Processing => Some(Self::Success),
            Self::Success => Some(Self::LeftoversReclaimProcessing),
            Self::LeftoversReclaimProcessing => Some(Self::LeftoversReclaimSuccess),
            _ => None,
        }
    }

    fn error_state(self) -> Option<Self> {
        match self {
            Self::Processing => Some(Self::Error),
            Self::LeftoversReclaimProcessing => Some(Self::LeftoversReclaimError),
            _ => None,
        }
    }

    fn recovery_state(self) -> Option<Self> {
        match self {
            Self::Error => Some(Self::Processing),
            Self::LeftoversReclaimError => Some(Self::LeftoversReclaimProcessing),
            _ => None,
        }
    }
}

macro_rules! impl_display_via_debug {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}({})", self, self.code())
            }
        })*
    };
}

impl_display_via_debug!(PaymentStatus, PrlStatus, ClaimPrlStatus, GasTransferStatus);

/// Resolve an optional stored code, defaulting unset (`None` or `0`) to the
/// family's initial status.
pub fn status_or_initial<S: LedgerStatus>(code: Option<i32>) -> Result<S> {
    match code {
        None | Some(0) => Ok(S::INITIAL),
        Some(code) => S::from_code(code),
    }
}
