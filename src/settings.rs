use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String,
    pub data_dir: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReferralTier {
    pub id: String,
    pub referrals_required: i64,
    pub reward_coins: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Rewards {
    pub referral_code_prefix: String,
    pub referral_bonus_coins: i64,
    pub min_withdrawal_in_cents: i64,
    pub leaderboard_limit: usize,
    pub special_bonus_ads_required: i64,
    pub special_bonus_coins: i64,
    #[serde(default)]
    pub referral_tiers: Vec<ReferralTier>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub storage: Storage,
    pub rewards: Rewards,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        config.try_deserialize()
    }
}
