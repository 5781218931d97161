use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use donor_engine::workflows::campaign::{DeliveryError, NotificationChannel, OutboundMessage};
use donor_engine::workflows::donation::{
    AboGroup, Appointment, BloodGroup, DonationStore, DonationType, Donor, Gender,
    InMemoryDonationStore, NewAppointment, NewDonation, NewDonor, RepositoryError, RhFactor,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stand-in for the messaging front-end: writes each message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingChannel;

#[async_trait]
impl NotificationChannel for LoggingChannel {
    async fn deliver(&self, donor: &Donor, message: &OutboundMessage) -> Result<(), DeliveryError> {
        if donor.blocked {
            return Err(DeliveryError::RecipientBlocked);
        }
        info!(
            donor = %donor.id,
            kind = message.kind.label(),
            text = %message.text,
            "notification delivered"
        );
        Ok(())
    }
}

/// Demo and development data loaded into the in-memory store.
#[derive(Debug, Clone)]
pub(crate) struct SeededCatalog {
    pub(crate) donors: Vec<Donor>,
    pub(crate) appointments: Vec<Appointment>,
}

pub(crate) fn seed_store(
    store: &InMemoryDonationStore,
    today: NaiveDate,
) -> Result<SeededCatalog, RepositoryError> {
    let rare = BloodGroup::new(AboGroup::AB, RhFactor::Negative);

    store.transaction(|session| -> Result<SeededCatalog, RepositoryError> {
        let donors = vec![
            session.insert_donor(NewDonor {
                full_name: "Maria Ivanova".to_string(),
                gender: Gender::Female,
                blood_group: Some(BloodGroup::new(AboGroup::A, RhFactor::Positive)),
            })?,
            session.insert_donor(NewDonor {
                full_name: "Pavel Sokolov".to_string(),
                gender: Gender::Male,
                blood_group: Some(rare),
            })?,
            session.insert_donor(NewDonor {
                full_name: "Dana Kim".to_string(),
                gender: Gender::Unspecified,
                blood_group: Some(BloodGroup::new(AboGroup::O, RhFactor::Negative)),
            })?,
        ];

        session.insert_donation(NewDonation {
            donor_id: donors[2].id,
            appointment_id: None,
            donated_on: today - Duration::days(5),
            donation_type: DonationType::Plasma,
            points_awarded: 0,
        })?;

        let appointments = vec![
            session.insert_appointment(NewAppointment {
                title: "Campus whole blood drive".to_string(),
                location: "Main building, hall 2".to_string(),
                starts_at: at_nine(today + Duration::days(3)),
                donation_type: DonationType::WholeBlood,
                points_per_donation: 10,
                rare_blood_bonus_points: 5,
                bonus_blood_groups: BTreeSet::from([rare]),
                capacity: 3,
            })?,
            session.insert_appointment(NewAppointment {
                title: "Plasma Tuesday".to_string(),
                location: "Regional blood centre".to_string(),
                starts_at: at_nine(today + Duration::days(10)),
                donation_type: DonationType::Plasma,
                points_per_donation: 8,
                rare_blood_bonus_points: 0,
                bonus_blood_groups: BTreeSet::new(),
                capacity: 10,
            })?,
        ];

        Ok(SeededCatalog {
            donors,
            appointments,
        })
    })
}

fn at_nine(date: NaiveDate) -> chrono::NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN) + Duration::hours(9)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
