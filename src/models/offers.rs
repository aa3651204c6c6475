use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialOfferRecord {
    pub id: String,
    pub date_completed: chrono::NaiveDate,
    pub coins_earned: i64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOffer {
    pub offer_id: String,
    pub coins_earned: i64,
}
