use std::collections::BTreeSet;
use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::workflows::donation::domain::{
    AboGroup, Appointment, BloodGroup, DonationRecord, DonationType, Donor, Gender,
    MedicalWaiver, RhFactor, WaiverOrigin,
};
use crate::workflows::donation::eligibility::{
    DonationPolicy, EligibilityEngine, EligibilitySnapshot,
};
use crate::workflows::donation::memory::InMemoryDonationStore;
use crate::workflows::donation::repository::{
    DonationStore, NewAppointment, NewDonation, NewDonor, NewWaiver, RepositoryError,
    StoreSession,
};
use crate::workflows::donation::service::{load_snapshot, DonationService};

pub(super) const RARE: BloodGroup = BloodGroup::new(AboGroup::AB, RhFactor::Negative);

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn at(day: NaiveDate, hour: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, 0, 0).expect("valid time")
}

pub(super) fn build_service() -> (
    DonationService<InMemoryDonationStore>,
    Arc<InMemoryDonationStore>,
) {
    let store = Arc::new(InMemoryDonationStore::default());
    let service = DonationService::new(store.clone(), DonationPolicy::default());
    (service, store)
}

pub(super) fn engine() -> EligibilityEngine {
    EligibilityEngine::new(DonationPolicy::default())
}

fn write<T>(
    store: &InMemoryDonationStore,
    work: impl FnOnce(&mut dyn StoreSession) -> Result<T, RepositoryError>,
) -> T {
    store.transaction(work).expect("store write succeeds")
}

pub(super) fn add_donor(
    store: &InMemoryDonationStore,
    name: &str,
    gender: Gender,
    blood_group: Option<BloodGroup>,
) -> Donor {
    write(store, |session| {
        session.insert_donor(NewDonor {
            full_name: name.to_string(),
            gender,
            blood_group,
        })
    })
}

pub(super) fn add_appointment(
    store: &InMemoryDonationStore,
    title: &str,
    starts_at: NaiveDateTime,
    donation_type: DonationType,
    capacity: u32,
) -> Appointment {
    write(store, |session| {
        session.insert_appointment(NewAppointment {
            title: title.to_string(),
            location: "Blood centre".to_string(),
            starts_at,
            donation_type,
            points_per_donation: 10,
            rare_blood_bonus_points: 5,
            bonus_blood_groups: BTreeSet::from([RARE]),
            capacity,
        })
    })
}

pub(super) fn add_donation(
    store: &InMemoryDonationStore,
    donor: &Donor,
    donated_on: NaiveDate,
    donation_type: DonationType,
) -> DonationRecord {
    write(store, |session| {
        session.insert_donation(NewDonation {
            donor_id: donor.id,
            appointment_id: None,
            donated_on,
            donation_type,
            points_awarded: 0,
        })
    })
}

pub(super) fn add_waiver(
    store: &InMemoryDonationStore,
    donor: &Donor,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
    origin: WaiverOrigin,
) -> MedicalWaiver {
    write(store, |session| {
        session.insert_waiver(NewWaiver {
            donor_id: donor.id,
            starts_on,
            ends_on,
            reason: "Flu".to_string(),
            origin,
        })
    })
}

pub(super) fn update_donor(store: &InMemoryDonationStore, donor: &Donor) {
    write(store, |session| session.update_donor(donor))
}

pub(super) fn update_appointment(store: &InMemoryDonationStore, appointment: &Appointment) {
    write(store, |session| session.update_appointment(appointment))
}

pub(super) fn fetch_donor(store: &InMemoryDonationStore, donor: &Donor) -> Donor {
    write(store, |session| session.donor(donor.id)).expect("donor exists")
}

pub(super) fn fetch_appointment(
    store: &InMemoryDonationStore,
    appointment: &Appointment,
) -> Appointment {
    write(store, |session| session.appointment(appointment.id)).expect("appointment exists")
}

pub(super) fn donations_of(store: &InMemoryDonationStore, donor: &Donor) -> Vec<DonationRecord> {
    write(store, |session| session.donations_for_donor(donor.id))
}

pub(super) fn snapshot(
    store: &InMemoryDonationStore,
    donor: &Donor,
    appointment: &Appointment,
) -> EligibilitySnapshot {
    store
        .transaction(|session| load_snapshot(&*session, donor.id, appointment.id))
        .expect("snapshot loads")
}

/// Store whose every transaction fails before running.
pub(super) struct UnavailableStore;

impl DonationStore for UnavailableStore {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
