use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{
    Appointment, AppointmentId, BloodGroup, DonationId, DonationRecord, DonationType, Donor,
    DonorId, Gender, MedicalWaiver, Registration, RegistrationId, RegistrationStatus, WaiverId,
    WaiverOrigin,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDonor {
    pub full_name: String,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub title: String,
    pub location: String,
    pub starts_at: NaiveDateTime,
    pub donation_type: DonationType,
    pub points_per_donation: u32,
    pub rare_blood_bonus_points: u32,
    pub bonus_blood_groups: BTreeSet<BloodGroup>,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    pub donor_id: DonorId,
    pub appointment_id: AppointmentId,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDonation {
    pub donor_id: DonorId,
    pub appointment_id: Option<AppointmentId>,
    pub donated_on: NaiveDate,
    pub donation_type: DonationType,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWaiver {
    pub donor_id: DonorId,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub reason: String,
    pub origin: WaiverOrigin,
}

/// Reads and writes available inside one storage transaction.
pub trait StoreSession {
    fn donor(&self, id: DonorId) -> Result<Option<Donor>, RepositoryError>;
    /// All donors in id order.
    fn donors(&self) -> Result<Vec<Donor>, RepositoryError>;
    fn insert_donor(&mut self, donor: NewDonor) -> Result<Donor, RepositoryError>;
    fn update_donor(&mut self, donor: &Donor) -> Result<(), RepositoryError>;

    fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, RepositoryError>;
    /// Appointments starting in `[from, until)`, ordered by start.
    fn appointments_starting_between(
        &self,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Appointment>, RepositoryError>;
    fn insert_appointment(
        &mut self,
        appointment: NewAppointment,
    ) -> Result<Appointment, RepositoryError>;
    fn update_appointment(&mut self, appointment: &Appointment) -> Result<(), RepositoryError>;

    fn registration(&self, id: RegistrationId) -> Result<Option<Registration>, RepositoryError>;
    fn registrations_for_donor(&self, donor: DonorId)
        -> Result<Vec<Registration>, RepositoryError>;
    fn registrations_for_appointment(
        &self,
        appointment: AppointmentId,
    ) -> Result<Vec<Registration>, RepositoryError>;
    fn insert_registration(
        &mut self,
        registration: NewRegistration,
    ) -> Result<Registration, RepositoryError>;
    fn update_registration(&mut self, registration: &Registration) -> Result<(), RepositoryError>;
    fn delete_registration(&mut self, id: RegistrationId) -> Result<bool, RepositoryError>;

    fn donations_for_donor(&self, donor: DonorId) -> Result<Vec<DonationRecord>, RepositoryError>;
    fn donations_on(&self, date: NaiveDate) -> Result<Vec<DonationRecord>, RepositoryError>;
    fn insert_donation(&mut self, donation: NewDonation) -> Result<DonationRecord, RepositoryError>;
    fn mark_feedback_requested(&mut self, id: DonationId) -> Result<(), RepositoryError>;

    fn waiver(&self, id: WaiverId) -> Result<Option<MedicalWaiver>, RepositoryError>;
    fn waivers_for_donor(&self, donor: DonorId) -> Result<Vec<MedicalWaiver>, RepositoryError>;
    /// Every waiver whose range includes `date`, across all donors.
    fn waivers_covering(&self, date: NaiveDate) -> Result<Vec<MedicalWaiver>, RepositoryError>;
    fn waivers_ending_on(&self, date: NaiveDate) -> Result<Vec<MedicalWaiver>, RepositoryError>;
    fn insert_waiver(&mut self, waiver: NewWaiver) -> Result<MedicalWaiver, RepositoryError>;
    fn delete_waiver(&mut self, id: WaiverId) -> Result<bool, RepositoryError>;

    fn seats_taken(&self, appointment: AppointmentId) -> Result<usize, RepositoryError> {
        Ok(self
            .registrations_for_appointment(appointment)?
            .iter()
            .filter(|registration| registration.status.holds_seat())
            .count())
    }

    fn find_registration(
        &self,
        donor: DonorId,
        appointment: AppointmentId,
        status: RegistrationStatus,
    ) -> Result<Option<Registration>, RepositoryError> {
        Ok(self
            .registrations_for_donor(donor)?
            .into_iter()
            .find(|registration| {
                registration.appointment_id == appointment && registration.status == status
            }))
    }
}

/// Storage abstraction so the engine can be exercised in isolation.
///
/// `transaction` must serialize concurrent units of work and commit the writes of
/// `work` only when it returns `Ok`.
pub trait DonationStore: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, E>,
        E: From<RepositoryError>;
}
