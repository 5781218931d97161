use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::messages::OutboundMessage;
use crate::workflows::donation::domain::{Donor, DonorId};

/// Failure delivering a single message; never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("recipient blocked the channel")]
    RecipientBlocked,
    #[error("recipient unreachable: {0}")]
    Unreachable(String),
    #[error("delivery timed out after {0} ms")]
    TimedOut(u64),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Outbound side of the messaging front-end.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, donor: &Donor, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Anything the dispatcher can address a message to.
pub trait Recipient {
    fn donor(&self) -> &Donor;
}

impl Recipient for Donor {
    fn donor(&self) -> &Donor {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub donor_id: DonorId,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Counts plus per-recipient outcomes in recipient order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    fn from_outcomes(outcomes: Vec<DeliveryOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|outcome| outcome.is_delivered()).count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        }
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

/// Fans a message out to many recipients concurrently.
#[derive(Debug, Clone, Copy)]
pub struct CampaignDispatcher {
    delivery_timeout: Duration,
}

impl CampaignDispatcher {
    pub fn new(delivery_timeout: Duration) -> Self {
        Self { delivery_timeout }
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    pub async fn dispatch<R, B, C>(
        &self,
        recipients: &[R],
        build_message: B,
        channel: &C,
    ) -> DispatchReport
    where
        R: Recipient + Sync,
        B: Fn(&R) -> OutboundMessage,
        C: NotificationChannel + ?Sized,
    {
        let limit = self.delivery_timeout;
        let sends = recipients.iter().map(|recipient| {
            let message = build_message(recipient);
            async move {
                let donor = recipient.donor();
                let result = match timeout(limit, channel.deliver(donor, &message)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::TimedOut(limit.as_millis() as u64)),
                };
                if let Err(error) = &result {
                    warn!(
                        donor = %donor.id,
                        kind = message.kind.label(),
                        %error,
                        "notification delivery failed"
                    );
                }
                DeliveryOutcome {
                    donor_id: donor.id,
                    result,
                }
            }
        });

        let report = DispatchReport::from_outcomes(join_all(sends).await);
        debug!(
            succeeded = report.succeeded,
            failed = report.failed,
            "dispatch finished"
        );
        report
    }
}
