mod config;
mod policy;
mod rules;

pub use config::DonationPolicy;
pub use policy::{EligibilityDecision, RegistrationMode, RejectionReason};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{Appointment, DonationRecord, Donor, MedicalWaiver, Registration};

/// One of the donor's registrations joined with its appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRegistration {
    pub registration: Registration,
    pub appointment: Appointment,
}

/// Everything the rules need, loaded inside one storage transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySnapshot {
    pub donor: Donor,
    pub appointment: Appointment,
    /// Non-cancelled registrations currently held for the appointment.
    pub seats_taken: usize,
    pub schedule: Vec<ScheduledRegistration>,
    pub waivers: Vec<MedicalWaiver>,
    pub donations: Vec<DonationRecord>,
}

/// Stateless evaluator applying the donation policy to a snapshot.
#[derive(Debug, Clone, Default)]
pub struct EligibilityEngine {
    policy: DonationPolicy,
}

impl EligibilityEngine {
    pub fn new(policy: DonationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DonationPolicy {
        &self.policy
    }

    pub fn evaluate(
        &self,
        snapshot: &EligibilitySnapshot,
        mode: RegistrationMode,
    ) -> EligibilityDecision {
        let gate: rules::Rule = match mode {
            RegistrationMode::SelfService => rules::registration_open,
            RegistrationMode::AdministratorOverride => rules::not_blocked,
        };

        std::iter::once(gate)
            .chain(rules::SHARED_RULES)
            .find_map(|rule| rule(snapshot, &self.policy))
            .map_or(EligibilityDecision::Eligible, EligibilityDecision::Rejected)
    }

    /// Earliest date the donor may donate again, never before `today`.
    pub fn next_donation_date(
        &self,
        donor: &Donor,
        waivers: &[MedicalWaiver],
        donations: &[DonationRecord],
        today: NaiveDate,
    ) -> NaiveDate {
        let after_waiver = waivers
            .iter()
            .filter(|waiver| waiver.ends_on >= today)
            .map(|waiver| waiver.ends_on + Duration::days(1))
            .max();

        let after_recovery = donations
            .iter()
            .max_by_key(|donation| donation.donated_on)
            .map(|last| {
                last.donated_on
                    + self.policy.recovery_interval(last.donation_type, donor.gender)
                    + Duration::days(1)
            });

        [Some(today), after_waiver, after_recovery]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(today)
    }
}
