//! Donor registration, eligibility and the donation transaction.

pub mod domain;
pub mod eligibility;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod waivers;

#[cfg(test)]
mod tests;

pub use domain::{
    AboGroup, Appointment, AppointmentId, BloodGroup, DonationId, DonationRecord, DonationType,
    Donor, DonorId, Gender, MedicalWaiver, Registration, RegistrationId, RegistrationStatus,
    RhFactor, StaffId, WaiverId, WaiverOrigin,
};
pub use eligibility::{
    DonationPolicy, EligibilityDecision, EligibilityEngine, EligibilitySnapshot,
    RegistrationMode, RejectionReason, ScheduledRegistration,
};
pub use memory::InMemoryDonationStore;
pub use repository::{
    DonationStore, NewAppointment, NewDonation, NewDonor, NewRegistration, NewWaiver,
    RepositoryError, StoreSession,
};
pub use router::donation_router;
pub use service::{
    DonationReceipt, DonationService, LifecycleError, ManualConfirmation, RegistrationOutcome,
};
pub use waivers::{WaiverError, WaiverLedger};
