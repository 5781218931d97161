use crate::infra::{seed_store, SeededCatalog};
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use donor_engine::error::AppError;
use donor_engine::workflows::campaign::{
    AppointmentAnnouncer, CampaignDispatcher, DeliveryError, NotificationChannel, OutboundMessage,
};
use donor_engine::workflows::donation::{
    DonationPolicy, DonationService, Donor, InMemoryDonationStore, LifecycleError,
    RegistrationOutcome, WaiverLedger,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference date for the walkthrough (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Per-message delivery timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub(crate) delivery_timeout_ms: u64,
}

struct ConsoleChannel;

#[async_trait]
impl NotificationChannel for ConsoleChannel {
    async fn deliver(&self, donor: &Donor, message: &OutboundMessage) -> Result<(), DeliveryError> {
        println!("    -> {} [{}]: {}", donor.full_name, message.kind.label(), message.text);
        Ok(())
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let store = Arc::new(InMemoryDonationStore::default());
    let SeededCatalog {
        donors,
        appointments,
    } = seed_store(&store, today).map_err(|err| AppError::Lifecycle(err.into()))?;

    let service = Arc::new(DonationService::new(
        store.clone(),
        DonationPolicy::default(),
    ));
    let waivers = WaiverLedger::new(store);

    println!("Donor engine demo ({})", today.format("%d.%m.%Y"));
    println!("Donors:");
    for donor in &donors {
        let group = donor
            .blood_group
            .map(|group| group.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  {} {} ({group})", donor.id, donor.full_name);
    }
    println!("Appointments:");
    for appointment in &appointments {
        println!(
            "  {} {} on {} [{}; {} seats]",
            appointment.id,
            appointment.title,
            appointment.starts_at.format("%d.%m.%Y %H:%M"),
            appointment.donation_type.label(),
            appointment.capacity
        );
    }

    let drive = &appointments[0];
    let plasma = &appointments[1];

    println!("\nRegistration for {}", drive.title);
    let mut registrations = BTreeMap::new();
    for donor in &donors {
        match service.register(donor.id, drive.id)? {
            RegistrationOutcome::Registered(registration) => {
                println!("  {} registered as {}", donor.full_name, registration.id);
                registrations.insert(donor.id, registration.id);
            }
            RegistrationOutcome::Rejected(reason) => {
                println!("  {} rejected: {}", donor.full_name, reason.summary())
            }
        }
    }
    let drive_state = service.appointment(drive.id)?;
    println!(
        "  Registration open after sign-ups: {}",
        drive_state.registration_open
    );

    let pavel = &donors[1];
    let registration = registrations
        .get(&pavel.id)
        .copied()
        .ok_or(LifecycleError::MissingDonor(pavel.id))?;
    println!("\nConfirming donation for {}", pavel.full_name);
    let receipt = service.confirm_donation(registration)?;
    println!(
        "  Points awarded: {} (rare blood bonus: {})",
        receipt.points_awarded, receipt.rare_blood_bonus
    );
    println!(
        "  Recovery waiver until {}",
        receipt.waiver_end_date.format("%d.%m.%Y")
    );
    match service.confirm_donation(registration) {
        Err(err @ LifecycleError::AlreadyConfirmed(_)) => println!("  Second confirmation: {err}"),
        Err(err) => return Err(err.into()),
        Ok(_) => println!("  Second confirmation unexpectedly succeeded"),
    }

    println!("\nEligibility for {}", plasma.title);
    let decision = service.check_eligibility(pavel.id, plasma.id)?;
    println!("  {}: {}", pavel.full_name, decision.summary());
    let next = service.next_donation_date(pavel.id, today)?;
    println!("  Next possible donation: {}", next.format("%d.%m.%Y"));

    let maria = &donors[0];
    let waiver = waivers
        .report_self(maria.id, today, today + Duration::days(7), "Cold")?;
    println!(
        "  {} paused themselves until {}",
        maria.full_name,
        waiver.ends_on.format("%d.%m.%Y")
    );

    println!("\nAnnouncing {}", plasma.title);
    let announcer = AppointmentAnnouncer::new(
        service.clone(),
        CampaignDispatcher::new(std::time::Duration::from_millis(args.delivery_timeout_ms)),
        Arc::new(ConsoleChannel),
    );
    let report = announcer.announce(plasma.id).await?;
    println!(
        "  Delivered {} of {} announcements",
        report.succeeded,
        report.attempted()
    );

    Ok(())
}
