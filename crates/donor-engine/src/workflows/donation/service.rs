use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    Appointment, AppointmentId, DonationRecord, Donor, DonorId, MedicalWaiver, Registration,
    RegistrationId, RegistrationStatus, StaffId, WaiverOrigin,
};
use super::eligibility::{
    DonationPolicy, EligibilityDecision, EligibilityEngine, EligibilitySnapshot,
    RegistrationMode, RejectionReason, ScheduledRegistration,
};
use super::repository::{
    DonationStore, NewDonation, NewRegistration, NewWaiver, RepositoryError, StoreSession,
};
use crate::workflows::campaign::NotificationFilter;

/// Result of a registration attempt; a rejection is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationOutcome {
    Registered(Registration),
    Rejected(RejectionReason),
}

/// Everything written by a confirmed donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationReceipt {
    pub registration_id: RegistrationId,
    pub points_awarded: u32,
    pub rare_blood_bonus: bool,
    pub waiver_end_date: NaiveDate,
    pub donation: DonationRecord,
    pub waiver: MedicalWaiver,
}

/// Staff confirmation of a donation that may have no live registration yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualConfirmation {
    pub donor_id: DonorId,
    pub appointment_id: AppointmentId,
    pub confirmed_by: StaffId,
    #[serde(default)]
    pub joined_marrow_registry: bool,
}

/// Error raised by the donation lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0} not found")]
    MissingDonor(DonorId),
    #[error("{0} not found")]
    MissingAppointment(AppointmentId),
    #[error("{0} not found")]
    MissingRegistration(RegistrationId),
    #[error("donation for {0} was already confirmed")]
    AlreadyConfirmed(RegistrationId),
    #[error("{0} was cancelled and cannot be confirmed")]
    RegistrationCancelled(RegistrationId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl LifecycleError {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            LifecycleError::AlreadyConfirmed(_) | LifecycleError::RegistrationCancelled(_)
        )
    }

    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            LifecycleError::MissingDonor(_)
                | LifecycleError::MissingAppointment(_)
                | LifecycleError::MissingRegistration(_)
        )
    }
}

/// Service composing the store, the eligibility engine and the notification filter.
pub struct DonationService<S> {
    store: Arc<S>,
    engine: Arc<EligibilityEngine>,
    filter: NotificationFilter,
}

impl<S> DonationService<S>
where
    S: DonationStore + 'static,
{
    pub fn new(store: Arc<S>, policy: DonationPolicy) -> Self {
        let engine = Arc::new(EligibilityEngine::new(policy));
        let filter = NotificationFilter::new(engine.clone());
        Self {
            store,
            engine,
            filter,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> &DonationPolicy {
        self.engine.policy()
    }

    fn transaction<T>(
        &self,
        work: impl FnOnce(&mut dyn StoreSession) -> Result<T, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        self.store.transaction(work)
    }

    pub fn appointment(&self, appointment_id: AppointmentId) -> Result<Appointment, LifecycleError> {
        self.transaction(|session| {
            session
                .appointment(appointment_id)?
                .ok_or(LifecycleError::MissingAppointment(appointment_id))
        })
    }

    /// Run every registration rule without writing anything.
    pub fn check_eligibility(
        &self,
        donor_id: DonorId,
        appointment_id: AppointmentId,
    ) -> Result<EligibilityDecision, LifecycleError> {
        self.check_with_mode(donor_id, appointment_id, RegistrationMode::SelfService)
    }

    pub fn check_eligibility_as_administrator(
        &self,
        donor_id: DonorId,
        appointment_id: AppointmentId,
    ) -> Result<EligibilityDecision, LifecycleError> {
        self.check_with_mode(
            donor_id,
            appointment_id,
            RegistrationMode::AdministratorOverride,
        )
    }

    fn check_with_mode(
        &self,
        donor_id: DonorId,
        appointment_id: AppointmentId,
        mode: RegistrationMode,
    ) -> Result<EligibilityDecision, LifecycleError> {
        self.transaction(|session| {
            let snapshot = load_snapshot(&*session, donor_id, appointment_id)?;
            Ok(self.engine.evaluate(&snapshot, mode))
        })
    }

    pub fn register(
        &self,
        donor_id: DonorId,
        appointment_id: AppointmentId,
    ) -> Result<RegistrationOutcome, LifecycleError> {
        self.register_with_mode(donor_id, appointment_id, RegistrationMode::SelfService)
    }

    pub fn register_as_administrator(
        &self,
        donor_id: DonorId,
        appointment_id: AppointmentId,
        staff: StaffId,
    ) -> Result<RegistrationOutcome, LifecycleError> {
        let outcome = self.register_with_mode(
            donor_id,
            appointment_id,
            RegistrationMode::AdministratorOverride,
        )?;
        if let RegistrationOutcome::Registered(registration) = &outcome {
            info!(%staff, registration = %registration.id, "registration forced by staff");
        }
        Ok(outcome)
    }

    /// Check, insert and close the appointment at capacity as one unit of work.
    fn register_with_mode(
        &self,
        donor_id: DonorId,
        appointment_id: AppointmentId,
        mode: RegistrationMode,
    ) -> Result<RegistrationOutcome, LifecycleError> {
        self.transaction(|session| {
            let snapshot = load_snapshot(&*session, donor_id, appointment_id)?;
            if let EligibilityDecision::Rejected(reason) = self.engine.evaluate(&snapshot, mode) {
                debug!(%donor_id, %appointment_id, reason = %reason.summary(), "registration rejected");
                return Ok(RegistrationOutcome::Rejected(reason));
            }

            let registration = session.insert_registration(NewRegistration {
                donor_id,
                appointment_id,
                created_at: Local::now().naive_local(),
            })?;

            let mut appointment = snapshot.appointment;
            let seats_taken = session.seats_taken(appointment_id)?;
            if appointment.registration_open && seats_taken >= appointment.capacity as usize {
                appointment.registration_open = false;
                session.update_appointment(&appointment)?;
                info!(%appointment_id, capacity = appointment.capacity, "registration closed at capacity");
            }

            Ok(RegistrationOutcome::Registered(registration))
        })
    }

    /// Drop the donor's live registration; returns whether one existed.
    pub fn cancel_registration(
        &self,
        donor_id: DonorId,
        appointment_id: AppointmentId,
    ) -> Result<bool, LifecycleError> {
        self.transaction(|session| {
            match session.find_registration(
                donor_id,
                appointment_id,
                RegistrationStatus::Registered,
            )? {
                Some(registration) => Ok(session.delete_registration(registration.id)?),
                None => Ok(false),
            }
        })
    }

    /// Turn a live registration into a completed donation.
    pub fn confirm_donation(
        &self,
        registration_id: RegistrationId,
    ) -> Result<DonationReceipt, LifecycleError> {
        self.transaction(|session| {
            let registration = session
                .registration(registration_id)?
                .ok_or(LifecycleError::MissingRegistration(registration_id))?;

            match registration.status {
                RegistrationStatus::Attended => {
                    return Err(LifecycleError::AlreadyConfirmed(registration_id))
                }
                RegistrationStatus::Cancelled => {
                    return Err(LifecycleError::RegistrationCancelled(registration_id))
                }
                RegistrationStatus::Registered | RegistrationStatus::NoShowSurveyed => {}
            }

            let donor = session
                .donor(registration.donor_id)?
                .ok_or(LifecycleError::MissingDonor(registration.donor_id))?;
            let appointment = session
                .appointment(registration.appointment_id)?
                .ok_or(LifecycleError::MissingAppointment(registration.appointment_id))?;

            record_donation(session, self.engine.policy(), donor, registration, &appointment)
        })
    }

    /// Staff confirmation: materializes a registration when the donor never signed up.
    pub fn confirm_manually(
        &self,
        request: ManualConfirmation,
    ) -> Result<DonationReceipt, LifecycleError> {
        let ManualConfirmation {
            donor_id,
            appointment_id,
            confirmed_by,
            joined_marrow_registry,
        } = request;

        let receipt = self.transaction(|session| {
            let mut donor = session
                .donor(donor_id)?
                .ok_or(LifecycleError::MissingDonor(donor_id))?;
            let appointment = session
                .appointment(appointment_id)?
                .ok_or(LifecycleError::MissingAppointment(appointment_id))?;

            let live = match session.find_registration(
                donor_id,
                appointment_id,
                RegistrationStatus::Registered,
            )? {
                Some(registration) => Some(registration),
                None => session.find_registration(
                    donor_id,
                    appointment_id,
                    RegistrationStatus::NoShowSurveyed,
                )?,
            };

            let registration = match live {
                Some(registration) => registration,
                None => {
                    if let Some(attended) = session.find_registration(
                        donor_id,
                        appointment_id,
                        RegistrationStatus::Attended,
                    )? {
                        return Err(LifecycleError::AlreadyConfirmed(attended.id));
                    }
                    session.insert_registration(NewRegistration {
                        donor_id,
                        appointment_id,
                        created_at: Local::now().naive_local(),
                    })?
                }
            };

            if joined_marrow_registry {
                donor.marrow_registry = true;
            }

            record_donation(session, self.engine.policy(), donor, registration, &appointment)
        })?;

        info!(
            staff = %confirmed_by,
            %donor_id,
            %appointment_id,
            points = receipt.points_awarded,
            "donation confirmed manually"
        );
        Ok(receipt)
    }

    /// Donors who should hear about the appointment, in donor-id order.
    pub fn notification_recipients(
        &self,
        appointment_id: AppointmentId,
    ) -> Result<Vec<Donor>, LifecycleError> {
        self.transaction(|session| {
            let appointment = session
                .appointment(appointment_id)?
                .ok_or(LifecycleError::MissingAppointment(appointment_id))?;
            let donors = session.donors()?;
            Ok(self.filter.recipients_for(&*session, &appointment, donors)?)
        })
    }

    pub fn next_donation_date(
        &self,
        donor_id: DonorId,
        today: NaiveDate,
    ) -> Result<NaiveDate, LifecycleError> {
        self.transaction(|session| {
            let donor = session
                .donor(donor_id)?
                .ok_or(LifecycleError::MissingDonor(donor_id))?;
            let waivers = session.waivers_for_donor(donor_id)?;
            let donations = session.donations_for_donor(donor_id)?;
            Ok(self
                .engine
                .next_donation_date(&donor, &waivers, &donations, today))
        })
    }
}

pub(crate) fn load_snapshot(
    session: &dyn StoreSession,
    donor_id: DonorId,
    appointment_id: AppointmentId,
) -> Result<EligibilitySnapshot, LifecycleError> {
    let donor = session
        .donor(donor_id)?
        .ok_or(LifecycleError::MissingDonor(donor_id))?;
    let appointment = session
        .appointment(appointment_id)?
        .ok_or(LifecycleError::MissingAppointment(appointment_id))?;
    let seats_taken = session.seats_taken(appointment_id)?;

    let schedule = session
        .registrations_for_donor(donor_id)?
        .into_iter()
        .map(|registration| {
            let appointment = session
                .appointment(registration.appointment_id)?
                .ok_or(LifecycleError::MissingAppointment(registration.appointment_id))?;
            Ok(ScheduledRegistration {
                registration,
                appointment,
            })
        })
        .collect::<Result<Vec<_>, LifecycleError>>()?;

    Ok(EligibilitySnapshot {
        donor,
        appointment,
        seats_taken,
        schedule,
        waivers: session.waivers_for_donor(donor_id)?,
        donations: session.donations_for_donor(donor_id)?,
    })
}

fn record_donation(
    session: &mut dyn StoreSession,
    policy: &DonationPolicy,
    mut donor: Donor,
    mut registration: Registration,
    appointment: &Appointment,
) -> Result<DonationReceipt, LifecycleError> {
    let rare_blood_bonus = appointment.grants_rare_blood_bonus(&donor);
    let points_awarded = if rare_blood_bonus {
        appointment
            .points_per_donation
            .saturating_add(appointment.rare_blood_bonus_points)
    } else {
        appointment.points_per_donation
    };

    let donated_on = appointment.date();
    let donation = session.insert_donation(NewDonation {
        donor_id: donor.id,
        appointment_id: Some(appointment.id),
        donated_on,
        donation_type: appointment.donation_type,
        points_awarded,
    })?;

    let waiver_end_date =
        donated_on + policy.recovery_interval(appointment.donation_type, donor.gender);
    let waiver = session.insert_waiver(NewWaiver {
        donor_id: donor.id,
        starts_on: donated_on,
        ends_on: waiver_end_date,
        reason: format!("{} donation", appointment.donation_type.label()),
        origin: WaiverOrigin::System,
    })?;

    donor.points = donor.points.saturating_add(points_awarded);
    session.update_donor(&donor)?;

    registration.status = RegistrationStatus::Attended;
    session.update_registration(&registration)?;

    info!(
        donor = %donor.id,
        appointment = %appointment.id,
        points = points_awarded,
        rare_blood_bonus,
        waiver_until = %waiver_end_date,
        "donation recorded"
    );

    Ok(DonationReceipt {
        registration_id: registration.id,
        points_awarded,
        rare_blood_bonus,
        waiver_end_date,
        donation,
        waiver,
    })
}
