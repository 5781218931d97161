use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::workflows::donation::domain::{Appointment, MedicalWaiver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Announcement,
    Reminder,
    FeedbackPrompt,
    WaiverExpired,
    NoShowSurvey,
}

impl MessageKind {
    pub const fn label(self) -> &'static str {
        match self {
            MessageKind::Announcement => "announcement",
            MessageKind::Reminder => "reminder",
            MessageKind::FeedbackPrompt => "feedback_prompt",
            MessageKind::WaiverExpired => "waiver_expired",
            MessageKind::NoShowSurvey => "no_show_survey",
        }
    }
}

/// Answers offered by the no-show micro-survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoShowReason {
    MedicalWaiver,
    PersonalReasons,
    Forgot,
}

impl NoShowReason {
    pub const ALL: [NoShowReason; 3] = [
        NoShowReason::MedicalWaiver,
        NoShowReason::PersonalReasons,
        NoShowReason::Forgot,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            NoShowReason::MedicalWaiver => "I got a medical waiver",
            NoShowReason::PersonalReasons => "Personal reasons",
            NoShowReason::Forgot => "I forgot",
        }
    }
}

/// Rendered text plus any quick replies the channel should offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<String>,
}

impl OutboundMessage {
    fn plain(kind: MessageKind, text: String) -> Self {
        Self {
            kind,
            text,
            replies: Vec::new(),
        }
    }
}

fn when(appointment: &Appointment) -> String {
    appointment.starts_at.format("%d.%m.%Y at %H:%M").to_string()
}

pub fn announcement(appointment: &Appointment) -> OutboundMessage {
    OutboundMessage::plain(
        MessageKind::Announcement,
        format!(
            "New {} donation: {} on {}, {}. Registration is open while seats last.",
            appointment.donation_type.label().to_lowercase(),
            appointment.title,
            when(appointment),
            appointment.location
        ),
    )
}

pub fn reminder(appointment: &Appointment, lead: Duration) -> OutboundMessage {
    OutboundMessage::plain(
        MessageKind::Reminder,
        format!(
            "Reminder: {} starts {} ({}, {}). Please get some rest and eat before donating.",
            appointment.title,
            describe_lead(lead),
            when(appointment),
            appointment.location
        ),
    )
}

pub fn feedback_prompt(donated_on: NaiveDate) -> OutboundMessage {
    OutboundMessage::plain(
        MessageKind::FeedbackPrompt,
        format!(
            "Thank you for donating on {}! How are you feeling? Reply to tell us how it went.",
            donated_on.format("%d.%m.%Y")
        ),
    )
}

pub fn waiver_expired(waiver: &MedicalWaiver) -> OutboundMessage {
    OutboundMessage::plain(
        MessageKind::WaiverExpired,
        format!(
            "Your waiver ({}) ended on {}. You can sign up for donations again.",
            waiver.reason,
            waiver.ends_on.format("%d.%m.%Y")
        ),
    )
}

pub fn no_show_survey(appointment: &Appointment) -> OutboundMessage {
    OutboundMessage {
        kind: MessageKind::NoShowSurvey,
        text: format!(
            "We missed you at {} on {}. What got in the way?",
            appointment.title,
            when(appointment)
        ),
        replies: NoShowReason::ALL
            .iter()
            .map(|reason| reason.label().to_string())
            .collect(),
    }
}

fn describe_lead(lead: Duration) -> String {
    let days = lead.num_days();
    let hours = lead.num_hours();
    match (days, hours) {
        (1, _) => "tomorrow".to_string(),
        (days, _) if days > 1 => format!("in {days} days"),
        (_, 1) => "in an hour".to_string(),
        (_, hours) => format!("in {hours} hours"),
    }
}
