use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};

use super::domain::{
    Appointment, AppointmentId, DonationId, DonationRecord, Donor, DonorId, MedicalWaiver,
    Registration, RegistrationId, RegistrationStatus, WaiverId,
};
use super::repository::{
    DonationStore, NewAppointment, NewDonation, NewDonor, NewRegistration, NewWaiver,
    RepositoryError, StoreSession,
};

/// Mutex-guarded store that applies each transaction to a working copy.
#[derive(Debug, Default)]
pub struct InMemoryDonationStore {
    state: Mutex<StoreState>,
}

impl DonationStore for InMemoryDonationStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?;

        // An error drops `working`, so a failed transaction leaves the state untouched.
        let mut working = guard.clone();
        let value = work(&mut working)?;
        *guard = working;
        Ok(value)
    }
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    sequence: u64,
    donors: BTreeMap<DonorId, Donor>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    registrations: BTreeMap<RegistrationId, Registration>,
    donations: BTreeMap<DonationId, DonationRecord>,
    waivers: BTreeMap<WaiverId, MedicalWaiver>,
}

impl StoreState {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

impl StoreSession for StoreState {
    fn donor(&self, id: DonorId) -> Result<Option<Donor>, RepositoryError> {
        Ok(self.donors.get(&id).cloned())
    }

    fn donors(&self) -> Result<Vec<Donor>, RepositoryError> {
        Ok(self.donors.values().cloned().collect())
    }

    fn insert_donor(&mut self, donor: NewDonor) -> Result<Donor, RepositoryError> {
        let id = DonorId(self.next_id());
        let record = Donor {
            id,
            full_name: donor.full_name,
            gender: donor.gender,
            blood_group: donor.blood_group,
            points: 0,
            blocked: false,
            marrow_registry: false,
        };
        self.donors.insert(id, record.clone());
        Ok(record)
    }

    fn update_donor(&mut self, donor: &Donor) -> Result<(), RepositoryError> {
        let slot = self
            .donors
            .get_mut(&donor.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = donor.clone();
        Ok(())
    }

    fn appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.appointments.get(&id).cloned())
    }

    fn appointments_starting_between(
        &self,
        from: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let mut matching: Vec<Appointment> = self
            .appointments
            .values()
            .filter(|appointment| appointment.starts_at >= from && appointment.starts_at < until)
            .cloned()
            .collect();
        matching.sort_by_key(|appointment| appointment.starts_at);
        Ok(matching)
    }

    fn insert_appointment(
        &mut self,
        appointment: NewAppointment,
    ) -> Result<Appointment, RepositoryError> {
        let id = AppointmentId(self.next_id());
        let record = Appointment {
            id,
            title: appointment.title,
            location: appointment.location,
            starts_at: appointment.starts_at,
            donation_type: appointment.donation_type,
            points_per_donation: appointment.points_per_donation,
            rare_blood_bonus_points: appointment.rare_blood_bonus_points,
            bonus_blood_groups: appointment.bonus_blood_groups,
            capacity: appointment.capacity,
            registration_open: true,
            active: true,
        };
        self.appointments.insert(id, record.clone());
        Ok(record)
    }

    fn update_appointment(&mut self, appointment: &Appointment) -> Result<(), RepositoryError> {
        let slot = self
            .appointments
            .get_mut(&appointment.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = appointment.clone();
        Ok(())
    }

    fn registration(&self, id: RegistrationId) -> Result<Option<Registration>, RepositoryError> {
        Ok(self.registrations.get(&id).cloned())
    }

    fn registrations_for_donor(
        &self,
        donor: DonorId,
    ) -> Result<Vec<Registration>, RepositoryError> {
        Ok(self
            .registrations
            .values()
            .filter(|registration| registration.donor_id == donor)
            .cloned()
            .collect())
    }

    fn registrations_for_appointment(
        &self,
        appointment: AppointmentId,
    ) -> Result<Vec<Registration>, RepositoryError> {
        Ok(self
            .registrations
            .values()
            .filter(|registration| registration.appointment_id == appointment)
            .cloned()
            .collect())
    }

    fn insert_registration(
        &mut self,
        registration: NewRegistration,
    ) -> Result<Registration, RepositoryError> {
        if !self.donors.contains_key(&registration.donor_id)
            || !self.appointments.contains_key(&registration.appointment_id)
        {
            return Err(RepositoryError::NotFound);
        }

        let id = RegistrationId(self.next_id());
        let record = Registration {
            id,
            donor_id: registration.donor_id,
            appointment_id: registration.appointment_id,
            status: RegistrationStatus::Registered,
            created_at: registration.created_at,
        };
        self.registrations.insert(id, record.clone());
        Ok(record)
    }

    fn update_registration(&mut self, registration: &Registration) -> Result<(), RepositoryError> {
        let slot = self
            .registrations
            .get_mut(&registration.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = registration.clone();
        Ok(())
    }

    fn delete_registration(&mut self, id: RegistrationId) -> Result<bool, RepositoryError> {
        Ok(self.registrations.remove(&id).is_some())
    }

    fn donations_for_donor(&self, donor: DonorId) -> Result<Vec<DonationRecord>, RepositoryError> {
        let mut donations: Vec<DonationRecord> = self
            .donations
            .values()
            .filter(|donation| donation.donor_id == donor)
            .cloned()
            .collect();
        donations.sort_by_key(|donation| donation.donated_on);
        Ok(donations)
    }

    fn donations_on(&self, date: NaiveDate) -> Result<Vec<DonationRecord>, RepositoryError> {
        Ok(self
            .donations
            .values()
            .filter(|donation| donation.donated_on == date)
            .cloned()
            .collect())
    }

    fn insert_donation(&mut self, donation: NewDonation) -> Result<DonationRecord, RepositoryError> {
        let id = DonationId(self.next_id());
        let record = DonationRecord {
            id,
            donor_id: donation.donor_id,
            appointment_id: donation.appointment_id,
            donated_on: donation.donated_on,
            donation_type: donation.donation_type,
            points_awarded: donation.points_awarded,
            feedback_requested: false,
        };
        self.donations.insert(id, record.clone());
        Ok(record)
    }

    fn mark_feedback_requested(&mut self, id: DonationId) -> Result<(), RepositoryError> {
        let donation = self
            .donations
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        donation.feedback_requested = true;
        Ok(())
    }

    fn waiver(&self, id: WaiverId) -> Result<Option<MedicalWaiver>, RepositoryError> {
        Ok(self.waivers.get(&id).cloned())
    }

    fn waivers_for_donor(&self, donor: DonorId) -> Result<Vec<MedicalWaiver>, RepositoryError> {
        Ok(self
            .waivers
            .values()
            .filter(|waiver| waiver.donor_id == donor)
            .cloned()
            .collect())
    }

    fn waivers_covering(&self, date: NaiveDate) -> Result<Vec<MedicalWaiver>, RepositoryError> {
        Ok(self
            .waivers
            .values()
            .filter(|waiver| waiver.covers(date))
            .cloned()
            .collect())
    }

    fn waivers_ending_on(&self, date: NaiveDate) -> Result<Vec<MedicalWaiver>, RepositoryError> {
        Ok(self
            .waivers
            .values()
            .filter(|waiver| waiver.ends_on == date)
            .cloned()
            .collect())
    }

    fn insert_waiver(&mut self, waiver: NewWaiver) -> Result<MedicalWaiver, RepositoryError> {
        let id = WaiverId(self.next_id());
        let record = MedicalWaiver {
            id,
            donor_id: waiver.donor_id,
            starts_on: waiver.starts_on,
            ends_on: waiver.ends_on,
            reason: waiver.reason,
            origin: waiver.origin,
        };
        self.waivers.insert(id, record.clone());
        Ok(record)
    }

    fn delete_waiver(&mut self, id: WaiverId) -> Result<bool, RepositoryError> {
        Ok(self.waivers.remove(&id).is_some())
    }
}
