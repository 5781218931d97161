use super::common::*;
use crate::workflows::donation::domain::{
    AboGroup, AppointmentId, BloodGroup, DonationType, DonorId, Gender, Registration,
    RegistrationId, RegistrationStatus, RhFactor, StaffId, WaiverOrigin,
};
use crate::workflows::donation::eligibility::{DonationPolicy, RejectionReason};
use crate::workflows::donation::repository::{DonationStore, RepositoryError};
use crate::workflows::donation::service::{
    DonationService, LifecycleError, ManualConfirmation, RegistrationOutcome,
};
use std::sync::Arc;

fn registered(outcome: RegistrationOutcome) -> Registration {
    match outcome {
        RegistrationOutcome::Registered(registration) => registration,
        other => panic!("expected registration, got {other:?}"),
    }
}

#[test]
fn registration_closes_the_appointment_when_full() {
    let (service, store) = build_service();
    let first = add_donor(&store, "Donor One", Gender::Male, None);
    let second = add_donor(&store, "Donor Two", Gender::Female, None);
    let third = add_donor(&store, "Donor Three", Gender::Male, None);
    let drive = add_appointment(
        &store,
        "Two seats",
        at(date(2025, 5, 5), 9),
        DonationType::Plasma,
        2,
    );

    registered(service.register(first.id, drive.id).expect("register"));
    assert!(fetch_appointment(&store, &drive).registration_open);
    registered(service.register(second.id, drive.id).expect("register"));
    assert!(!fetch_appointment(&store, &drive).registration_open);

    let outcome = service.register(third.id, drive.id).expect("register");
    assert_eq!(
        outcome,
        RegistrationOutcome::Rejected(RejectionReason::RegistrationClosed)
    );
}

#[test]
fn administrator_registration_past_closure_still_respects_capacity() {
    let (service, store) = build_service();
    let first = add_donor(&store, "Donor One", Gender::Male, None);
    let second = add_donor(&store, "Donor Two", Gender::Male, None);
    let drive = add_appointment(
        &store,
        "One seat",
        at(date(2025, 5, 5), 9),
        DonationType::Plasma,
        1,
    );
    registered(service.register(first.id, drive.id).expect("register"));

    let outcome = service
        .register_as_administrator(second.id, drive.id, StaffId(1))
        .expect("register");
    assert_eq!(
        outcome,
        RegistrationOutcome::Rejected(RejectionReason::CapacityReached { capacity: 1 })
    );
}

#[test]
fn concurrent_registrations_never_exceed_capacity() {
    let (service, store) = build_service();
    let donors: Vec<_> = (0..8)
        .map(|index| add_donor(&store, &format!("Donor {index}"), Gender::Male, None))
        .collect();
    let drive = add_appointment(
        &store,
        "Busy drive",
        at(date(2025, 5, 5), 9),
        DonationType::WholeBlood,
        3,
    );

    let outcomes: Vec<RegistrationOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = donors
            .iter()
            .map(|donor| {
                let service = &service;
                let appointment = drive.id;
                scope.spawn(move || service.register(donor.id, appointment))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .expect("thread completes")
                    .expect("registration runs")
            })
            .collect()
    });

    let successes = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, RegistrationOutcome::Registered(_)))
        .count();
    assert_eq!(successes, 3);
    assert!(!fetch_appointment(&store, &drive).registration_open);
    assert_eq!(snapshot(&store, &donors[0], &drive).seats_taken, 3);
}

#[test]
fn cancelling_removes_the_live_registration_once() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Cancel Me", Gender::Female, None);
    let drive = add_appointment(
        &store,
        "Cancellable",
        at(date(2025, 5, 5), 9),
        DonationType::Plasma,
        5,
    );
    registered(service.register(donor.id, drive.id).expect("register"));

    assert!(service
        .cancel_registration(donor.id, drive.id)
        .expect("cancel runs"));
    assert!(!service
        .cancel_registration(donor.id, drive.id)
        .expect("cancel runs"));
    assert_eq!(snapshot(&store, &donor, &drive).seats_taken, 0);
}

#[test]
fn rare_blood_donor_receives_bonus_points() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Rare Donor", Gender::Male, Some(RARE));
    let drive = add_appointment(
        &store,
        "Bonus drive",
        at(date(2025, 5, 5), 9),
        DonationType::WholeBlood,
        5,
    );
    let registration = registered(service.register(donor.id, drive.id).expect("register"));

    let receipt = service
        .confirm_donation(registration.id)
        .expect("donation confirmed");

    assert!(receipt.rare_blood_bonus);
    assert_eq!(receipt.points_awarded, 15);
    assert_eq!(fetch_donor(&store, &donor).points, 15);
}

#[test]
fn rh_negative_outside_the_bonus_list_gets_base_points() {
    let (service, store) = build_service();
    let donor = add_donor(
        &store,
        "Negative Donor",
        Gender::Male,
        Some(BloodGroup::new(AboGroup::O, RhFactor::Negative)),
    );
    let drive = add_appointment(
        &store,
        "Bonus drive",
        at(date(2025, 5, 5), 9),
        DonationType::WholeBlood,
        5,
    );
    let registration = registered(service.register(donor.id, drive.id).expect("register"));

    let receipt = service
        .confirm_donation(registration.id)
        .expect("donation confirmed");

    assert!(!receipt.rare_blood_bonus);
    assert_eq!(receipt.points_awarded, 10);
}

#[test]
fn donation_writes_record_waiver_and_attendance() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Female Donor", Gender::Female, None);
    let drive = add_appointment(
        &store,
        "Whole blood",
        at(date(2025, 1, 10), 9),
        DonationType::WholeBlood,
        5,
    );
    let registration = registered(service.register(donor.id, drive.id).expect("register"));

    let receipt = service
        .confirm_donation(registration.id)
        .expect("donation confirmed");

    let policy = DonationPolicy::default();
    assert_eq!(
        receipt.waiver_end_date,
        date(2025, 1, 10) + policy.recovery_interval(DonationType::WholeBlood, Gender::Female)
    );
    assert_eq!(receipt.waiver_end_date, date(2025, 4, 10));
    assert_eq!(receipt.waiver.origin, WaiverOrigin::System);
    assert_eq!(receipt.waiver.reason, "Whole blood donation");
    assert_eq!(receipt.waiver.starts_on, date(2025, 1, 10));
    assert_eq!(receipt.donation.donated_on, date(2025, 1, 10));
    assert_eq!(receipt.donation.appointment_id, Some(drive.id));

    let status = store
        .transaction(|session| session.registration(registration.id))
        .expect("read registration")
        .expect("registration exists")
        .status;
    assert_eq!(status, RegistrationStatus::Attended);
}

#[test]
fn component_donation_waiver_lasts_fourteen_days() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Plasma Donor", Gender::Female, None);
    let drive = add_appointment(
        &store,
        "Plasma",
        at(date(2025, 2, 20), 9),
        DonationType::Plasma,
        5,
    );
    let registration = registered(service.register(donor.id, drive.id).expect("register"));

    let receipt = service
        .confirm_donation(registration.id)
        .expect("donation confirmed");

    assert_eq!(receipt.waiver_end_date, date(2025, 3, 6));
}

#[test]
fn confirming_twice_is_a_conflict_with_one_record() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Twice", Gender::Male, None);
    let drive = add_appointment(
        &store,
        "Once only",
        at(date(2025, 5, 5), 9),
        DonationType::WholeBlood,
        5,
    );
    let registration = registered(service.register(donor.id, drive.id).expect("register"));
    service
        .confirm_donation(registration.id)
        .expect("first confirmation");

    let error = service
        .confirm_donation(registration.id)
        .expect_err("second confirmation fails");

    assert!(matches!(error, LifecycleError::AlreadyConfirmed(id) if id == registration.id));
    assert!(error.is_conflict());
    assert_eq!(donations_of(&store, &donor).len(), 1);
    assert_eq!(fetch_donor(&store, &donor).points, 10);
}

#[test]
fn cancelled_registration_cannot_be_confirmed() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Cancelled", Gender::Male, None);
    let drive = add_appointment(
        &store,
        "Cancelled drive",
        at(date(2025, 5, 5), 9),
        DonationType::WholeBlood,
        5,
    );
    let mut registration = registered(service.register(donor.id, drive.id).expect("register"));
    registration.status = RegistrationStatus::Cancelled;
    store
        .transaction(|session| session.update_registration(&registration))
        .expect("status updated");

    let error = service
        .confirm_donation(registration.id)
        .expect_err("cancelled registration");

    assert!(matches!(error, LifecycleError::RegistrationCancelled(_)));
    assert!(donations_of(&store, &donor).is_empty());
}

#[test]
fn unknown_registration_is_a_data_integrity_failure() {
    let (service, _) = build_service();

    let error = service
        .confirm_donation(RegistrationId(404))
        .expect_err("missing registration");

    assert!(error.is_data_integrity());
}

#[test]
fn manual_confirmation_materializes_a_registration() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Walk In", Gender::Male, None);
    let mut drive = add_appointment(
        &store,
        "Walk-in drive",
        at(date(2025, 5, 5), 9),
        DonationType::WholeBlood,
        1,
    );
    drive.registration_open = false;
    update_appointment(&store, &drive);

    let receipt = service
        .confirm_manually(ManualConfirmation {
            donor_id: donor.id,
            appointment_id: drive.id,
            confirmed_by: StaffId(3),
            joined_marrow_registry: true,
        })
        .expect("manual confirmation");

    assert_eq!(receipt.points_awarded, 10);
    let donor = fetch_donor(&store, &donor);
    assert!(donor.marrow_registry);
    assert_eq!(donor.points, 10);

    let error = service
        .confirm_manually(ManualConfirmation {
            donor_id: donor.id,
            appointment_id: drive.id,
            confirmed_by: StaffId(3),
            joined_marrow_registry: false,
        })
        .expect_err("already confirmed");
    assert!(matches!(error, LifecycleError::AlreadyConfirmed(id) if id == receipt.registration_id));
}

#[test]
fn manual_confirmation_reuses_the_live_registration() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Signed Up", Gender::Female, None);
    let drive = add_appointment(
        &store,
        "Regular drive",
        at(date(2025, 5, 5), 9),
        DonationType::Platelets,
        5,
    );
    let registration = registered(service.register(donor.id, drive.id).expect("register"));

    let receipt = service
        .confirm_manually(ManualConfirmation {
            donor_id: donor.id,
            appointment_id: drive.id,
            confirmed_by: StaffId(1),
            joined_marrow_registry: false,
        })
        .expect("manual confirmation");

    assert_eq!(receipt.registration_id, registration.id);
    assert!(!fetch_donor(&store, &donor).marrow_registry);
}

#[test]
fn manual_confirmation_for_missing_donor_leaves_no_trace() {
    let (service, store) = build_service();
    let drive = add_appointment(
        &store,
        "Ghost drive",
        at(date(2025, 5, 5), 9),
        DonationType::WholeBlood,
        5,
    );

    let error = service
        .confirm_manually(ManualConfirmation {
            donor_id: DonorId(999),
            appointment_id: drive.id,
            confirmed_by: StaffId(1),
            joined_marrow_registry: false,
        })
        .expect_err("missing donor");

    assert!(matches!(error, LifecycleError::MissingDonor(DonorId(999))));
    let registrations = store
        .transaction(|session| session.registrations_for_appointment(drive.id))
        .expect("read registrations");
    assert!(registrations.is_empty());
}

#[test]
fn repository_outage_surfaces_as_repository_error() {
    let service = DonationService::new(Arc::new(UnavailableStore), DonationPolicy::default());

    let error = service
        .check_eligibility(DonorId(1), AppointmentId(1))
        .expect_err("store offline");

    assert!(matches!(
        error,
        LifecycleError::Repository(RepositoryError::Unavailable(_))
    ));
    assert!(!error.is_conflict());
    assert!(!error.is_data_integrity());
}

#[test]
fn recent_plasma_keeps_donor_off_whole_blood_announcements_only_briefly() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "Plasma Regular", Gender::Male, None);
    let fresh = add_donor(&store, "Fresh Donor", Gender::Female, None);
    add_donation(&store, &donor, date(2025, 6, 1), DonationType::Plasma);
    let whole_blood = add_appointment(
        &store,
        "Whole blood",
        at(date(2025, 6, 11), 9),
        DonationType::WholeBlood,
        10,
    );
    let plasma = add_appointment(
        &store,
        "Plasma later",
        at(date(2025, 6, 26), 9),
        DonationType::Plasma,
        10,
    );

    let recipients = service
        .notification_recipients(whole_blood.id)
        .expect("filter runs");
    assert_eq!(
        recipients.iter().map(|donor| donor.id).collect::<Vec<_>>(),
        vec![fresh.id]
    );

    let recipients = service
        .notification_recipients(plasma.id)
        .expect("filter runs");
    assert_eq!(
        recipients.iter().map(|donor| donor.id).collect::<Vec<_>>(),
        vec![donor.id, fresh.id]
    );
}

#[test]
fn waived_donors_are_not_announced() {
    let (service, store) = build_service();
    let donor = add_donor(&store, "On Pause", Gender::Male, None);
    let drive = add_appointment(
        &store,
        "Paused drive",
        at(date(2025, 6, 11), 9),
        DonationType::Plasma,
        10,
    );
    add_waiver(
        &store,
        &donor,
        date(2025, 6, 1),
        date(2025, 6, 30),
        WaiverOrigin::SelfReported,
    );

    let recipients = service
        .notification_recipients(drive.id)
        .expect("filter runs");
    assert!(recipients.is_empty());
}
