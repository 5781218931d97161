use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered donor.
    DonorId,
    "donor"
);
entity_id!(
    /// Identifier of a scheduled donation appointment.
    AppointmentId,
    "appointment"
);
entity_id!(RegistrationId, "registration");
entity_id!(DonationId, "donation");
entity_id!(WaiverId, "waiver");
entity_id!(
    /// Staff member acting through the administrative dashboard.
    StaffId,
    "staff"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl Gender {
    pub const fn is_female(self) -> bool {
        matches!(self, Gender::Female)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AboGroup {
    O,
    A,
    B,
    AB,
}

impl AboGroup {
    pub const fn label(self) -> &'static str {
        match self {
            AboGroup::O => "O",
            AboGroup::A => "A",
            AboGroup::B => "B",
            AboGroup::AB => "AB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhFactor {
    Positive,
    Negative,
}

impl RhFactor {
    pub const fn sign(self) -> char {
        match self {
            RhFactor::Positive => '+',
            RhFactor::Negative => '-',
        }
    }
}

/// ABO group combined with the Rh factor, e.g. `AB Rh-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BloodGroup {
    pub abo: AboGroup,
    pub rh: RhFactor,
}

impl BloodGroup {
    pub const fn new(abo: AboGroup, rh: RhFactor) -> Self {
        Self { abo, rh }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Rh{}", self.abo.label(), self.rh.sign())
    }
}

/// Kind of donation collected at an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationType {
    WholeBlood,
    Plasma,
    Platelets,
    Erythrocytes,
}

impl DonationType {
    pub const fn label(self) -> &'static str {
        match self {
            DonationType::WholeBlood => "Whole blood",
            DonationType::Plasma => "Plasma",
            DonationType::Platelets => "Platelets",
            DonationType::Erythrocytes => "Erythrocytes",
        }
    }

    pub const fn is_whole_blood(self) -> bool {
        matches!(self, DonationType::WholeBlood)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donor {
    pub id: DonorId,
    pub full_name: String,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    pub points: u32,
    pub blocked: bool,
    pub marrow_registry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub title: String,
    pub location: String,
    pub starts_at: NaiveDateTime,
    pub donation_type: DonationType,
    pub points_per_donation: u32,
    pub rare_blood_bonus_points: u32,
    pub bonus_blood_groups: BTreeSet<BloodGroup>,
    pub capacity: u32,
    pub registration_open: bool,
    pub active: bool,
}

impl Appointment {
    pub fn date(&self) -> NaiveDate {
        self.starts_at.date()
    }

    /// Bonus applies only when the donor's exact group is enumerated on the appointment.
    pub fn grants_rare_blood_bonus(&self, donor: &Donor) -> bool {
        donor
            .blood_group
            .map(|group| self.bonus_blood_groups.contains(&group))
            .unwrap_or(false)
    }
}

/// Lifecycle of a donor's sign-up for an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    Attended,
    Cancelled,
    NoShowSurveyed,
}

impl RegistrationStatus {
    /// Whether the row occupies one of the appointment's seats.
    pub const fn holds_seat(self) -> bool {
        !matches!(self, RegistrationStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub donor_id: DonorId,
    pub appointment_id: AppointmentId,
    pub status: RegistrationStatus,
    pub created_at: NaiveDateTime,
}

/// Immutable record of a completed donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub id: DonationId,
    pub donor_id: DonorId,
    pub appointment_id: Option<AppointmentId>,
    pub donated_on: NaiveDate,
    pub donation_type: DonationType,
    pub points_awarded: u32,
    pub feedback_requested: bool,
}

/// Who issued a medical waiver, which also decides who may withdraw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaiverOrigin {
    System,
    SelfReported,
    Administrator(StaffId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalWaiver {
    pub id: WaiverId,
    pub donor_id: DonorId,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub reason: String,
    pub origin: WaiverOrigin,
}

impl MedicalWaiver {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.starts_on <= date && date <= self.ends_on
    }
}
