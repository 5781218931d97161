use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::super::domain::{DonationType, Gender};

/// Medical constants governing recovery intervals and annual quotas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationPolicy {
    pub whole_blood_recovery_days: u16,
    pub whole_blood_recovery_days_female: u16,
    pub component_recovery_days: u16,
    pub whole_blood_annual_quota: u32,
    pub whole_blood_annual_quota_female: u32,
    pub component_annual_quota: u32,
    pub quota_window_days: u16,
}

impl Default for DonationPolicy {
    fn default() -> Self {
        Self {
            whole_blood_recovery_days: 60,
            whole_blood_recovery_days_female: 90,
            component_recovery_days: 14,
            whole_blood_annual_quota: 5,
            whole_blood_annual_quota_female: 4,
            component_annual_quota: 12,
            quota_window_days: 365,
        }
    }
}

impl DonationPolicy {
    pub fn recovery_interval(&self, donation_type: DonationType, gender: Gender) -> Duration {
        let days = match donation_type {
            DonationType::WholeBlood if gender.is_female() => self.whole_blood_recovery_days_female,
            DonationType::WholeBlood => self.whole_blood_recovery_days,
            _ => self.component_recovery_days,
        };
        Duration::days(i64::from(days))
    }

    pub fn annual_quota(&self, donation_type: DonationType, gender: Gender) -> u32 {
        match donation_type {
            DonationType::WholeBlood if gender.is_female() => self.whole_blood_annual_quota_female,
            DonationType::WholeBlood => self.whole_blood_annual_quota,
            _ => self.component_annual_quota,
        }
    }

    pub fn quota_window(&self) -> Duration {
        Duration::days(i64::from(self.quota_window_days))
    }
}
