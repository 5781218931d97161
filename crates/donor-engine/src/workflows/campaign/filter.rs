use std::collections::BTreeSet;
use std::sync::Arc;

use crate::workflows::donation::domain::{Appointment, DonationRecord, Donor, DonorId};
use crate::workflows::donation::eligibility::{DonationPolicy, EligibilityEngine};
use crate::workflows::donation::repository::{RepositoryError, StoreSession};

/// Selects donors worth telling about an appointment.
#[derive(Debug, Clone)]
pub struct NotificationFilter {
    engine: Arc<EligibilityEngine>,
}

impl NotificationFilter {
    pub fn new(engine: Arc<EligibilityEngine>) -> Self {
        Self { engine }
    }

    /// Donors in id order who are neither waived, over quota nor still recovering.
    pub fn recipients_for(
        &self,
        session: &dyn StoreSession,
        appointment: &Appointment,
        mut donors: Vec<Donor>,
    ) -> Result<Vec<Donor>, RepositoryError> {
        let date = appointment.date();
        let waived: BTreeSet<DonorId> = session
            .waivers_covering(date)?
            .into_iter()
            .map(|waiver| waiver.donor_id)
            .collect();

        let policy = self.engine.policy();
        let window_start = date - policy.quota_window();

        donors.sort_by_key(|donor| donor.id);
        let mut recipients = Vec::new();
        for donor in donors {
            if waived.contains(&donor.id) {
                continue;
            }
            let recent: Vec<DonationRecord> = session
                .donations_for_donor(donor.id)?
                .into_iter()
                .filter(|donation| donation.donated_on >= window_start && donation.donated_on <= date)
                .collect();
            if admits(policy, appointment, &donor, &recent) {
                recipients.push(donor);
            }
        }
        Ok(recipients)
    }
}

fn admits(
    policy: &DonationPolicy,
    appointment: &Appointment,
    donor: &Donor,
    recent: &[DonationRecord],
) -> bool {
    let date = appointment.date();
    let recovering = |donation: &DonationRecord| {
        date <= donation.donated_on + policy.recovery_interval(donation.donation_type, donor.gender)
    };

    let same_type = recent
        .iter()
        .filter(|donation| donation.donation_type == appointment.donation_type)
        .count();
    if same_type >= policy.annual_quota(appointment.donation_type, donor.gender) as usize {
        return false;
    }

    if recent
        .iter()
        .max_by_key(|donation| donation.donated_on)
        .is_some_and(recovering)
    {
        return false;
    }

    if appointment.donation_type.is_whole_blood()
        && recent
            .iter()
            .filter(|donation| donation.donation_type.is_whole_blood())
            .max_by_key(|donation| donation.donated_on)
            .is_some_and(recovering)
    {
        return false;
    }

    true
}
