use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coins::CoinTransaction;
use crate::models::offers::SpecialOfferRecord;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub balance_in_cents: i64,
    pub coins: i64,
    pub referral_code: String,
    pub referrals_made: i64,
    pub claimed_referral_tiers: Vec<String>,
    pub daily_offers_date: NaiveDate,
    pub daily_special_offers_completed_ids: Vec<String>,
    pub historical_special_offers: Vec<SpecialOfferRecord>,
    pub coin_transaction_history: Vec<CoinTransaction>,
    pub special_bonus_ads_watched: i64,
    pub notification_preferences: HashMap<String, bool>,
    pub app_language: String,
    pub gender: Option<String>,
    pub age_range: Option<String>,
    pub contact_method: Option<String>,
    pub contact_detail: Option<String>,
    pub version: u64,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, name: &str, referral_code: &str) -> Self {
        let now = Utc::now();

        User {
            id: Uuid::new_v4().hyphenated().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            balance_in_cents: 0,
            coins: 0,
            referral_code: referral_code.to_string(),
            referrals_made: 0,
            claimed_referral_tiers: Vec::new(),
            daily_offers_date: now.date_naive(),
            daily_special_offers_completed_ids: Vec::new(),
            historical_special_offers: Vec::new(),
            coin_transaction_history: Vec::new(),
            special_bonus_ads_watched: 0,
            notification_preferences: HashMap::new(),
            app_language: "en".to_string(),
            gender: None,
            age_range: None,
            contact_method: None,
            contact_detail: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    // The daily completion set only ever holds entries for one day at a time.
    pub fn roll_daily_offers(&mut self, today: NaiveDate) {
        if self.daily_offers_date != today {
            self.daily_offers_date = today;
            self.daily_special_offers_completed_ids.clear();
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub app_language: Option<String>,
    pub gender: Option<String>,
    pub age_range: Option<String>,
    pub contact_method: Option<String>,
    pub contact_detail: Option<String>,
    pub notification_preferences: Option<HashMap<String, bool>>,
}
