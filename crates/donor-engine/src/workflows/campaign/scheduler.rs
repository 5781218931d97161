use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::dispatch::{CampaignDispatcher, DispatchReport, NotificationChannel, Recipient};
use super::messages;
use crate::workflows::donation::domain::{
    Appointment, DonationRecord, Donor, MedicalWaiver, Registration, RegistrationStatus,
};
use crate::workflows::donation::repository::{DonationStore, RepositoryError, StoreSession};

/// Wall-clock instants at which a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTrigger {
    Daily { hour: u32, minute: u32 },
    Hourly { minute: u32 },
}

impl JobTrigger {
    /// Whether a trigger instant lies in `(previous, now]`.
    pub fn fires_between(&self, previous: NaiveDateTime, now: NaiveDateTime) -> bool {
        let latest = match *self {
            JobTrigger::Daily { hour, minute } => {
                NaiveTime::from_hms_opt(hour, minute, 0).map(|time| {
                    let today = now.date().and_time(time);
                    if today > now {
                        today - Duration::days(1)
                    } else {
                        today
                    }
                })
            }
            JobTrigger::Hourly { minute } => {
                NaiveTime::from_hms_opt(now.hour(), minute, 0).map(|time| {
                    let this_hour = now.date().and_time(time);
                    if this_hour > now {
                        this_hour - Duration::hours(1)
                    } else {
                        this_hour
                    }
                })
            }
        };
        latest.is_some_and(|instant| instant > previous)
    }
}

/// How far ahead a reminder goes out, and the slice of appointments it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderLeadTime {
    pub lead: Duration,
    pub window: Duration,
    pub trigger: JobTrigger,
}

impl ReminderLeadTime {
    pub fn days(days: i64) -> Self {
        let minute = if days >= 7 { 0 } else { 30 };
        Self {
            lead: Duration::days(days),
            window: Duration::days(1),
            trigger: JobTrigger::Daily { hour: 10, minute },
        }
    }

    pub fn hours(hours: i64) -> Self {
        Self {
            lead: Duration::hours(hours),
            window: Duration::hours(1),
            trigger: JobTrigger::Hourly { minute: 0 },
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::days(7),
            Self::days(3),
            Self::days(1),
            Self::hours(2),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    LeadTimeReminder(ReminderLeadTime),
    FeedbackPrompt,
    WaiverExpiry,
    NoShowSurvey,
}

impl JobKind {
    pub const fn label(&self) -> &'static str {
        match self {
            JobKind::LeadTimeReminder(_) => "lead_time_reminder",
            JobKind::FeedbackPrompt => "feedback_prompt",
            JobKind::WaiverExpiry => "waiver_expiry",
            JobKind::NoShowSurvey => "no_show_survey",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    pub trigger: JobTrigger,
    pub kind: JobKind,
}

pub fn default_schedule(leads: &[ReminderLeadTime]) -> Vec<ScheduledJob> {
    let mut schedule: Vec<ScheduledJob> = leads
        .iter()
        .map(|lead| ScheduledJob {
            trigger: lead.trigger,
            kind: JobKind::LeadTimeReminder(*lead),
        })
        .collect();
    schedule.extend([
        ScheduledJob {
            trigger: JobTrigger::Daily { hour: 9, minute: 0 },
            kind: JobKind::WaiverExpiry,
        },
        ScheduledJob {
            trigger: JobTrigger::Daily {
                hour: 11,
                minute: 0,
            },
            kind: JobKind::FeedbackPrompt,
        },
        ScheduledJob {
            trigger: JobTrigger::Hourly { minute: 5 },
            kind: JobKind::NoShowSurvey,
        },
    ]);
    schedule
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub kind: JobKind,
    pub report: DispatchReport,
}

/// A registered donor joined with the appointment they signed up for.
#[derive(Debug, Clone)]
struct Attendee {
    registration: Registration,
    donor: Donor,
    appointment: Appointment,
}

impl Recipient for Attendee {
    fn donor(&self) -> &Donor {
        &self.donor
    }
}

#[derive(Debug, Clone)]
struct Donated {
    donation: DonationRecord,
    donor: Donor,
}

impl Recipient for Donated {
    fn donor(&self) -> &Donor {
        &self.donor
    }
}

#[derive(Debug, Clone)]
struct Recovered {
    waiver: MedicalWaiver,
    donor: Donor,
}

impl Recipient for Recovered {
    fn donor(&self) -> &Donor {
        &self.donor
    }
}

/// Time-triggered notification jobs; each takes the current instant explicitly.
pub struct ReminderScheduler<S, C: ?Sized> {
    store: Arc<S>,
    dispatcher: CampaignDispatcher,
    channel: Arc<C>,
    schedule: Vec<ScheduledJob>,
}

impl<S, C> ReminderScheduler<S, C>
where
    S: DonationStore + 'static,
    C: NotificationChannel + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        dispatcher: CampaignDispatcher,
        channel: Arc<C>,
        leads: &[ReminderLeadTime],
    ) -> Self {
        Self {
            store,
            dispatcher,
            channel,
            schedule: default_schedule(leads),
        }
    }

    pub fn schedule(&self) -> &[ScheduledJob] {
        &self.schedule
    }

    fn transaction<T>(
        &self,
        work: impl FnOnce(&mut dyn StoreSession) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        self.store.transaction(work)
    }

    /// Remind registered donors of active appointments starting in `[now + lead, now + lead + window)`.
    pub async fn send_lead_time_reminders(
        &self,
        now: NaiveDateTime,
        lead: ReminderLeadTime,
    ) -> Result<DispatchReport, RepositoryError> {
        let window = now
            .checked_add_signed(lead.lead)
            .and_then(|from| Some((from, from.checked_add_signed(lead.window)?)));
        let Some((from, until)) = window else {
            warn!(lead = %lead.lead, "reminder window is out of calendar range");
            return Ok(DispatchReport::default());
        };
        let attendees = self.transaction(|session| {
            let appointments = session
                .appointments_starting_between(from, until)?
                .into_iter()
                .filter(|appointment| appointment.active)
                .collect();
            registered_attendees(&*session, appointments)
        })?;

        Ok(self
            .dispatcher
            .dispatch(
                &attendees,
                |attendee| messages::reminder(&attendee.appointment, lead.lead),
                &*self.channel,
            )
            .await)
    }

    /// Ask yesterday's donors how it went, once per donation.
    pub async fn send_feedback_prompts(
        &self,
        now: NaiveDateTime,
    ) -> Result<DispatchReport, RepositoryError> {
        let yesterday = now.date() - Duration::days(1);
        let donated = self.transaction(|session| {
            let mut donated = Vec::new();
            for donation in session.donations_on(yesterday)? {
                if donation.feedback_requested {
                    continue;
                }
                match session.donor(donation.donor_id)? {
                    Some(donor) => donated.push(Donated { donation, donor }),
                    None => warn!(donation = %donation.id, donor = %donation.donor_id, "skipping donation without donor"),
                }
            }
            Ok(donated)
        })?;

        let report = self
            .dispatcher
            .dispatch(
                &donated,
                |entry| messages::feedback_prompt(entry.donation.donated_on),
                &*self.channel,
            )
            .await;

        self.transaction(|session| {
            for (entry, outcome) in donated.iter().zip(&report.outcomes) {
                if outcome.is_delivered() {
                    session.mark_feedback_requested(entry.donation.id)?;
                }
            }
            Ok(())
        })?;
        Ok(report)
    }

    /// Tell donors whose waiver ended yesterday that they may donate again.
    pub async fn send_waiver_expiry_notices(
        &self,
        now: NaiveDateTime,
    ) -> Result<DispatchReport, RepositoryError> {
        let today = now.date();
        let yesterday = today - Duration::days(1);
        let recovered = self.transaction(|session| {
            let mut seen = BTreeSet::new();
            let mut recovered = Vec::new();
            for waiver in session.waivers_ending_on(yesterday)? {
                if !seen.insert(waiver.donor_id) {
                    continue;
                }
                let still_waived = session
                    .waivers_for_donor(waiver.donor_id)?
                    .iter()
                    .any(|other| other.covers(today));
                if still_waived {
                    continue;
                }
                match session.donor(waiver.donor_id)? {
                    Some(donor) => recovered.push(Recovered { waiver, donor }),
                    None => warn!(waiver = %waiver.id, donor = %waiver.donor_id, "skipping waiver without donor"),
                }
            }
            Ok(recovered)
        })?;

        Ok(self
            .dispatcher
            .dispatch(
                &recovered,
                |entry| messages::waiver_expired(&entry.waiver),
                &*self.channel,
            )
            .await)
    }

    /// Survey donors still marked registered for appointments that started three to four hours ago.
    pub async fn send_no_show_surveys(
        &self,
        now: NaiveDateTime,
    ) -> Result<DispatchReport, RepositoryError> {
        let attendees = self.transaction(|session| {
            let appointments =
                session.appointments_starting_between(now - Duration::hours(4), now - Duration::hours(3))?;
            registered_attendees(&*session, appointments)
        })?;

        let report = self
            .dispatcher
            .dispatch(
                &attendees,
                |attendee| messages::no_show_survey(&attendee.appointment),
                &*self.channel,
            )
            .await;

        self.transaction(|session| {
            for (attendee, outcome) in attendees.iter().zip(&report.outcomes) {
                if !outcome.is_delivered() {
                    continue;
                }
                if let Some(mut registration) = session.registration(attendee.registration.id)? {
                    if registration.status == RegistrationStatus::Registered {
                        registration.status = RegistrationStatus::NoShowSurveyed;
                        session.update_registration(&registration)?;
                    }
                }
            }
            Ok(())
        })?;
        Ok(report)
    }

    pub async fn run_job(
        &self,
        kind: JobKind,
        now: NaiveDateTime,
    ) -> Result<DispatchReport, RepositoryError> {
        match kind {
            JobKind::LeadTimeReminder(lead) => self.send_lead_time_reminders(now, lead).await,
            JobKind::FeedbackPrompt => self.send_feedback_prompts(now).await,
            JobKind::WaiverExpiry => self.send_waiver_expiry_notices(now).await,
            JobKind::NoShowSurvey => self.send_no_show_surveys(now).await,
        }
    }

    /// Run every job whose trigger fell in `(previous, now]`; failures are logged and skipped.
    pub async fn run_due(&self, previous: NaiveDateTime, now: NaiveDateTime) -> Vec<JobReport> {
        let mut reports = Vec::new();
        for job in &self.schedule {
            if !job.trigger.fires_between(previous, now) {
                continue;
            }
            match self.run_job(job.kind, now).await {
                Ok(report) => {
                    info!(
                        job = job.kind.label(),
                        succeeded = report.succeeded,
                        failed = report.failed,
                        "scheduled job finished"
                    );
                    reports.push(JobReport {
                        kind: job.kind,
                        report,
                    });
                }
                Err(error) => {
                    warn!(job = job.kind.label(), %error, "scheduled job failed");
                }
            }
        }
        reports
    }

    /// Drive the schedule from the local clock until `shutdown` resolves.
    pub async fn run<F>(&self, tick: std::time::Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut previous = Local::now().naive_local();
        tokio::pin!(shutdown);

        info!(jobs = self.schedule.len(), ?tick, "reminder scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    let now = Local::now().naive_local();
                    self.run_due(previous, now).await;
                    previous = now;
                }
            }
        }
        info!("reminder scheduler stopped");
    }
}

fn registered_attendees(
    session: &dyn StoreSession,
    appointments: Vec<Appointment>,
) -> Result<Vec<Attendee>, RepositoryError> {
    let mut attendees = Vec::new();
    for appointment in appointments {
        for registration in session.registrations_for_appointment(appointment.id)? {
            if registration.status != RegistrationStatus::Registered {
                continue;
            }
            match session.donor(registration.donor_id)? {
                Some(donor) => attendees.push(Attendee {
                    registration,
                    donor,
                    appointment: appointment.clone(),
                }),
                None => warn!(
                    registration = %registration.id,
                    donor = %registration.donor_id,
                    "skipping registration without donor"
                ),
            }
        }
    }
    Ok(attendees)
}
