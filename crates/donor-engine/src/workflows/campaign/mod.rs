//! Recipient selection and notification fan-out for donation campaigns.

pub mod announce;
pub mod dispatch;
pub mod filter;
pub mod messages;
pub mod scheduler;

pub use announce::AppointmentAnnouncer;
pub use dispatch::{
    CampaignDispatcher, DeliveryError, DeliveryOutcome, DispatchReport, NotificationChannel,
    Recipient,
};
pub use filter::NotificationFilter;
pub use messages::{MessageKind, NoShowReason, OutboundMessage};
pub use scheduler::{
    default_schedule, JobKind, JobReport, JobTrigger, ReminderLeadTime, ReminderScheduler,
    ScheduledJob,
};
