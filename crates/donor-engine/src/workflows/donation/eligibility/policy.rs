use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::domain::DonationType;

/// Which entry point requested the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    SelfService,
    /// Staff-forced registration: ignores the open flag but refuses blocked donors.
    AdministratorOverride,
}

/// Outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EligibilityDecision {
    Eligible,
    Rejected(RejectionReason),
}

impl EligibilityDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, EligibilityDecision::Eligible)
    }

    pub fn summary(&self) -> String {
        match self {
            EligibilityDecision::Eligible => "all eligibility checks passed".to_string(),
            EligibilityDecision::Rejected(reason) => reason.summary(),
        }
    }
}

/// Reasons a registration is refused, in the order the checks run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    DonorBlocked,
    RegistrationClosed,
    AlreadyRegistered {
        appointment_title: String,
    },
    CapacityReached {
        capacity: u32,
    },
    ActiveWaiver {
        until: NaiveDate,
        reason: String,
    },
    PendingRecovery {
        appointment_title: String,
        appointment_date: NaiveDate,
        recovery_ends: NaiveDate,
    },
    AnnualQuotaReached {
        donation_type: DonationType,
        quota: u32,
    },
}

impl RejectionReason {
    pub fn summary(&self) -> String {
        match self {
            RejectionReason::DonorBlocked => "donor is blocked".to_string(),
            RejectionReason::RegistrationClosed => {
                "registration for this appointment is closed".to_string()
            }
            RejectionReason::AlreadyRegistered { appointment_title } => {
                format!("already registered for {appointment_title}")
            }
            RejectionReason::CapacityReached { capacity } => {
                format!("participant limit of {capacity} reached")
            }
            RejectionReason::ActiveWaiver { until, reason } => format!(
                "medical waiver in force until {} ({reason})",
                until.format("%d.%m.%Y")
            ),
            RejectionReason::PendingRecovery {
                appointment_title,
                appointment_date,
                recovery_ends,
            } => format!(
                "scheduled donation {appointment_title} on {} keeps a recovery waiver until {}",
                appointment_date.format("%d.%m.%Y"),
                recovery_ends.format("%d.%m.%Y")
            ),
            RejectionReason::AnnualQuotaReached {
                donation_type,
                quota,
            } => format!(
                "annual quota of {quota} {} donations reached, counting past and scheduled donations",
                donation_type.label().to_lowercase()
            ),
        }
    }
}
