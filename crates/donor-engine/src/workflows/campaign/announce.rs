use std::sync::Arc;

use tracing::info;

use super::dispatch::{CampaignDispatcher, DispatchReport, NotificationChannel};
use super::messages;
use crate::workflows::donation::domain::AppointmentId;
use crate::workflows::donation::repository::DonationStore;
use crate::workflows::donation::service::{DonationService, LifecycleError};

/// Tells every eligible donor about a newly published appointment.
pub struct AppointmentAnnouncer<S, C: ?Sized> {
    service: Arc<DonationService<S>>,
    dispatcher: CampaignDispatcher,
    channel: Arc<C>,
}

impl<S, C> AppointmentAnnouncer<S, C>
where
    S: DonationStore + 'static,
    C: NotificationChannel + ?Sized,
{
    pub fn new(
        service: Arc<DonationService<S>>,
        dispatcher: CampaignDispatcher,
        channel: Arc<C>,
    ) -> Self {
        Self {
            service,
            dispatcher,
            channel,
        }
    }

    pub async fn announce(
        &self,
        appointment_id: AppointmentId,
    ) -> Result<DispatchReport, LifecycleError> {
        let appointment = self.service.appointment(appointment_id)?;
        let recipients = self.service.notification_recipients(appointment_id)?;

        let report = self
            .dispatcher
            .dispatch(
                &recipients,
                |_| messages::announcement(&appointment),
                &*self.channel,
            )
            .await;

        info!(
            %appointment_id,
            recipients = recipients.len(),
            succeeded = report.succeeded,
            failed = report.failed,
            "appointment announced"
        );
        Ok(report)
    }
}
