use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::domain::{DonorId, MedicalWaiver, StaffId, WaiverId, WaiverOrigin};
use super::repository::{DonationStore, NewWaiver, RepositoryError, StoreSession};

#[derive(Debug, thiserror::Error)]
pub enum WaiverError {
    #[error("waiver ends on {until} which is before {today}")]
    InvalidRange { today: NaiveDate, until: NaiveDate },
    #[error("{0} not found")]
    MissingDonor(DonorId),
    #[error("{0} not found")]
    MissingWaiver(WaiverId),
    #[error("{waiver} is not a self-reported waiver of {donor}")]
    NotOwner { waiver: WaiverId, donor: DonorId },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Reads and maintains medical waivers on behalf of donors and staff.
pub struct WaiverLedger<S> {
    store: Arc<S>,
}

impl<S> WaiverLedger<S>
where
    S: DonationStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn transaction<T>(
        &self,
        work: impl FnOnce(&mut dyn StoreSession) -> Result<T, WaiverError>,
    ) -> Result<T, WaiverError> {
        self.store.transaction(work)
    }

    /// Waivers of the donor that have not ended before `today`, latest end first.
    pub fn active_for(
        &self,
        donor_id: DonorId,
        today: NaiveDate,
    ) -> Result<Vec<MedicalWaiver>, WaiverError> {
        self.transaction(|session| {
            let mut waivers: Vec<_> = session
                .waivers_for_donor(donor_id)?
                .into_iter()
                .filter(|waiver| waiver.ends_on >= today)
                .collect();
            waivers.sort_by(|a, b| b.ends_on.cmp(&a.ends_on));
            Ok(waivers)
        })
    }

    pub fn covering(&self, date: NaiveDate) -> Result<Vec<MedicalWaiver>, WaiverError> {
        self.transaction(|session| Ok(session.waivers_covering(date)?))
    }

    /// A donor pauses themselves from `today` through `until`.
    pub fn report_self(
        &self,
        donor_id: DonorId,
        today: NaiveDate,
        until: NaiveDate,
        reason: impl Into<String>,
    ) -> Result<MedicalWaiver, WaiverError> {
        if until < today {
            return Err(WaiverError::InvalidRange { today, until });
        }
        let reason = reason.into();
        self.transaction(|session| {
            session
                .donor(donor_id)?
                .ok_or(WaiverError::MissingDonor(donor_id))?;
            Ok(session.insert_waiver(NewWaiver {
                donor_id,
                starts_on: today,
                ends_on: until,
                reason,
                origin: WaiverOrigin::SelfReported,
            })?)
        })
    }

    /// Only the owning donor may remove a self-reported waiver.
    pub fn withdraw_self(&self, donor_id: DonorId, waiver_id: WaiverId) -> Result<(), WaiverError> {
        self.transaction(|session| {
            let waiver = session
                .waiver(waiver_id)?
                .ok_or(WaiverError::MissingWaiver(waiver_id))?;
            if waiver.donor_id != donor_id || waiver.origin != WaiverOrigin::SelfReported {
                return Err(WaiverError::NotOwner {
                    waiver: waiver_id,
                    donor: donor_id,
                });
            }
            session.delete_waiver(waiver_id)?;
            Ok(())
        })
    }

    pub fn issue_manual(
        &self,
        staff: StaffId,
        donor_id: DonorId,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
        reason: impl Into<String>,
    ) -> Result<MedicalWaiver, WaiverError> {
        if ends_on < starts_on {
            return Err(WaiverError::InvalidRange {
                today: starts_on,
                until: ends_on,
            });
        }
        let reason = reason.into();
        let waiver = self.transaction(|session| {
            session
                .donor(donor_id)?
                .ok_or(WaiverError::MissingDonor(donor_id))?;
            Ok(session.insert_waiver(NewWaiver {
                donor_id,
                starts_on,
                ends_on,
                reason,
                origin: WaiverOrigin::Administrator(staff),
            })?)
        })?;
        info!(%staff, donor = %donor_id, until = %ends_on, "manual waiver issued");
        Ok(waiver)
    }

    /// Staff may remove any waiver, system ones included.
    pub fn revoke_as_staff(&self, staff: StaffId, waiver_id: WaiverId) -> Result<(), WaiverError> {
        let removed = self.transaction(|session| Ok(session.delete_waiver(waiver_id)?))?;
        if !removed {
            return Err(WaiverError::MissingWaiver(waiver_id));
        }
        info!(%staff, waiver = %waiver_id, "waiver revoked");
        Ok(())
    }

    /// Waivers whose last day was `date`.
    pub fn expired_on(&self, date: NaiveDate) -> Result<Vec<MedicalWaiver>, WaiverError> {
        self.transaction(|session| Ok(session.waivers_ending_on(date)?))
    }
}
