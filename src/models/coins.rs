use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CoinTransactionKind {
    Earned,
    Spent,
    Bonus,
    Adjustment,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CoinTransactionKind,
    pub amount: i64,
    pub description: String,
    pub date: chrono::DateTime<chrono::Utc>,
}
