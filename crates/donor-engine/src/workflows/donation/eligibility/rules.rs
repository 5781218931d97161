use super::super::domain::RegistrationStatus;
use super::config::DonationPolicy;
use super::policy::RejectionReason;
use super::EligibilitySnapshot;

pub(crate) type Rule = fn(&EligibilitySnapshot, &DonationPolicy) -> Option<RejectionReason>;

/// Checks shared by every entry point, in user-facing order.
pub(crate) const SHARED_RULES: [Rule; 5] = [
    not_already_registered,
    seat_available,
    no_covering_waiver,
    no_pending_recovery,
    within_annual_quota,
];

pub(crate) fn not_blocked(
    snapshot: &EligibilitySnapshot,
    _policy: &DonationPolicy,
) -> Option<RejectionReason> {
    snapshot.donor.blocked.then_some(RejectionReason::DonorBlocked)
}

pub(crate) fn registration_open(
    snapshot: &EligibilitySnapshot,
    _policy: &DonationPolicy,
) -> Option<RejectionReason> {
    (!snapshot.appointment.registration_open).then_some(RejectionReason::RegistrationClosed)
}

fn not_already_registered(
    snapshot: &EligibilitySnapshot,
    _policy: &DonationPolicy,
) -> Option<RejectionReason> {
    let appointment = &snapshot.appointment;
    snapshot
        .schedule
        .iter()
        .any(|entry| {
            entry.registration.appointment_id == appointment.id
                && entry.registration.status == RegistrationStatus::Registered
        })
        .then(|| RejectionReason::AlreadyRegistered {
            appointment_title: appointment.title.clone(),
        })
}

fn seat_available(
    snapshot: &EligibilitySnapshot,
    _policy: &DonationPolicy,
) -> Option<RejectionReason> {
    let capacity = snapshot.appointment.capacity;
    (snapshot.seats_taken >= capacity as usize)
        .then_some(RejectionReason::CapacityReached { capacity })
}

fn no_covering_waiver(
    snapshot: &EligibilitySnapshot,
    _policy: &DonationPolicy,
) -> Option<RejectionReason> {
    let date = snapshot.appointment.date();
    snapshot
        .waivers
        .iter()
        .filter(|waiver| waiver.covers(date))
        .max_by_key(|waiver| waiver.ends_on)
        .map(|waiver| RejectionReason::ActiveWaiver {
            until: waiver.ends_on,
            reason: waiver.reason.clone(),
        })
}

/// A scheduled earlier donation implies a waiver the candidate date may fall into.
fn no_pending_recovery(
    snapshot: &EligibilitySnapshot,
    policy: &DonationPolicy,
) -> Option<RejectionReason> {
    let candidate = &snapshot.appointment;
    let candidate_date = candidate.date();
    let gender = snapshot.donor.gender;

    let mut earlier: Vec<_> = snapshot
        .schedule
        .iter()
        .filter(|entry| {
            entry.registration.status == RegistrationStatus::Registered
                && entry.appointment.id != candidate.id
                && entry.appointment.starts_at < candidate.starts_at
        })
        .collect();
    earlier.sort_by_key(|entry| entry.appointment.starts_at);

    earlier.into_iter().find_map(|entry| {
        let other = &entry.appointment;
        let recovery_ends =
            other.date() + policy.recovery_interval(other.donation_type, gender);
        (candidate_date <= recovery_ends).then(|| RejectionReason::PendingRecovery {
            appointment_title: other.title.clone(),
            appointment_date: other.date(),
            recovery_ends,
        })
    })
}

fn within_annual_quota(
    snapshot: &EligibilitySnapshot,
    policy: &DonationPolicy,
) -> Option<RejectionReason> {
    let candidate = &snapshot.appointment;
    let donation_type = candidate.donation_type;
    let date = candidate.date();
    let window = policy.quota_window();
    let quota = policy.annual_quota(donation_type, snapshot.donor.gender);

    let completed = snapshot
        .donations
        .iter()
        .filter(|donation| {
            donation.donation_type == donation_type
                && donation.donated_on >= date - window
                && donation.donated_on <= date
        })
        .count();

    let committed = snapshot
        .schedule
        .iter()
        .filter(|entry| {
            let other = &entry.appointment;
            entry.registration.status == RegistrationStatus::Registered
                && other.id != candidate.id
                && other.donation_type == donation_type
                && other.date() >= date - window
                && other.date() <= date + window
        })
        .count();

    (completed + committed >= quota as usize).then_some(RejectionReason::AnnualQuotaReached {
        donation_type,
        quota,
    })
}
