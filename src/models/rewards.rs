use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const REWARD_STATUS_COMPLETED: &str = "completed";

/// Deepest upline level that gets paid for a registration.
pub const MAX_REFERRAL_LEVEL: u8 = 3;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Welcome,
    ReferralL1,
    ReferralL2,
    ReferralL3,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Welcome => "welcome",
            RewardType::ReferralL1 => "referral_l1",
            RewardType::ReferralL2 => "referral_l2",
            RewardType::ReferralL3 => "referral_l3",
        }
    }

    /// Referral reward paid to the ancestor `level` edges above the new user.
    pub fn for_level(level: u8) -> Option<RewardType> {
        match level {
            1 => Some(RewardType::ReferralL1),
            2 => Some(RewardType::ReferralL2),
            3 => Some(RewardType::ReferralL3),
            _ => None,
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome" => Ok(RewardType::Welcome),
            "referral_l1" => Ok(RewardType::ReferralL1),
            "referral_l2" => Ok(RewardType::ReferralL2),
            "referral_l3" => Ok(RewardType::ReferralL3),
            other => Err(format!("unknown reward type: {}", other)),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardRecord {
    pub id: String,
    pub user_id: String,
    pub reward_type: RewardType,
    pub amount: i64,
    pub related_user_id: Option<String>,
    pub invitation_id: Option<String>,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug)]
pub struct NewRewardRecord {
    pub user_id: String,
    pub reward_type: RewardType,
    pub amount: i64,
    pub related_user_id: Option<String>,
    pub invitation_id: Option<String>,
}

/// Token amounts paid per reward type. Loaded from the `[rewards]` section of
/// the settings file.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RewardSchedule {
    pub welcome: i64,
    pub referral_l1: i64,
    pub referral_l2: i64,
    pub referral_l3: i64,
}

impl RewardSchedule {
    pub fn amount_for(&self, reward_type: RewardType) -> i64 {
        match reward_type {
            RewardType::Welcome => self.welcome,
            RewardType::ReferralL1 => self.referral_l1,
            RewardType::ReferralL2 => self.referral_l2,
            RewardType::ReferralL3 => self.referral_l3,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let amounts = [
            RewardType::Welcome,
            RewardType::ReferralL1,
            RewardType::ReferralL2,
            RewardType::ReferralL3,
        ];

        for reward_type in amounts {
            if self.amount_for(reward_type) < 0 {
                return Err(format!("reward amount for {} must not be negative", reward_type));
            }
        }

        Ok(())
    }
}

impl Default for RewardSchedule {
    fn default() -> Self {
        RewardSchedule {
            welcome: 100,
            referral_l1: 50,
            referral_l2: 25,
            referral_l3: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_type_round_trips_through_text() {
        for reward_type in [
            RewardType::Welcome,
            RewardType::ReferralL1,
            RewardType::ReferralL2,
            RewardType::ReferralL3,
        ] {
            assert_eq!(reward_type.as_str().parse::<RewardType>(), Ok(reward_type));
        }
        assert!("referral_l4".parse::<RewardType>().is_err());
    }

    #[test]
    fn test_for_level_stops_at_three() {
        assert_eq!(RewardType::for_level(1), Some(RewardType::ReferralL1));
        assert_eq!(RewardType::for_level(3), Some(RewardType::ReferralL3));
        assert_eq!(RewardType::for_level(0), None);
        assert_eq!(RewardType::for_level(MAX_REFERRAL_LEVEL + 1), None);
    }

    #[test]
    fn test_schedule_rejects_negative_amounts() {
        assert!(RewardSchedule::default().validate().is_ok());

        let schedule = RewardSchedule {
            referral_l2: -1,
            ..RewardSchedule::default()
        };
        assert!(schedule.validate().is_err());
    }
}
