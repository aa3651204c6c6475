use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::withdrawals::WithdrawalServiceRequest;
use super::{RequestHandler, Service, ServiceError};
use crate::models::coins::{CoinTransaction, CoinTransactionKind};
use crate::models::offers::SpecialOfferRecord;
use crate::models::users::{User, UserPatch};
use crate::repositories::users::UserRepository;
use crate::settings::Rewards;

pub enum LedgerRequest {
    Login {
        email: String,
        name: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    Logout {
        user_id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    GetUser {
        user_id: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    AddBalance {
        user_id: String,
        amount_in_cents: i64,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    DebitBalance {
        user_id: String,
        amount_in_cents: i64,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    ApplyReferral {
        user_id: String,
        code: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    ClaimReferralTier {
        user_id: String,
        tier_id: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    AddCoins {
        user_id: String,
        amount: i64,
        description: Option<String>,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    UpdateCoins {
        user_id: String,
        coins: i64,
        expected_version: Option<u64>,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    RedeemGiftCard {
        user_id: String,
        card_name: String,
        coin_cost: i64,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    CompleteSpecialOffer {
        user_id: String,
        offer_id: String,
        coins_earned: i64,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    RecordSpecialBonusAdWatch {
        user_id: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    UpdateUser {
        user_id: String,
        patch: UserPatch,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
}

fn record_coin_transaction(
    user: &mut User,
    kind: CoinTransactionKind,
    amount: i64,
    description: &str,
) {
    user.coin_transaction_history.push(CoinTransaction {
        id: Uuid::new_v4().hyphenated().to_string(),
        kind,
        amount,
        description: description.to_string(),
        date: Utc::now(),
    });
}

#[derive(Clone)]
pub struct LedgerRequestHandler {
    repository: UserRepository,
    withdrawal_channel: mpsc::Sender<WithdrawalServiceRequest>,
    rewards: Rewards,
}

impl LedgerRequestHandler {
    pub fn new(
        repository: UserRepository,
        withdrawal_channel: mpsc::Sender<WithdrawalServiceRequest>,
        rewards: Rewards,
    ) -> Self {
        LedgerRequestHandler {
            repository,
            withdrawal_channel,
            rewards,
        }
    }

    async fn load_user(&self, user_id: &str) -> Result<User, ServiceError> {
        let user = self
            .repository
            .get_user(user_id)
            .await
            .map_err(|e| ServiceError::Repository("Ledger".to_string(), e.to_string()))?;

        user.ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))
    }

    async fn save_user(&self, user: &mut User) -> Result<(), ServiceError> {
        self.repository
            .save_user(user)
            .await
            .map_err(|e| ServiceError::Repository("Ledger".to_string(), e.to_string()))
    }

    async fn login(&self, email: &str, name: &str) -> Result<User, ServiceError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ServiceError::Validation("Email cannot be empty.".to_string()));
        }

        let existing = self
            .repository
            .find_by_email(email)
            .await
            .map_err(|e| ServiceError::Repository("Ledger".to_string(), e.to_string()))?;
        if let Some(user) = existing {
            return Ok(user);
        }

        let referral_code = format!(
            "{}{}",
            self.rewards.referral_code_prefix,
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let mut user = User::new(email, name, &referral_code);
        self.save_user(&mut user).await?;

        log::info!("Created account {} for {}", user.id, email);

        Ok(user)
    }

    async fn logout(&self, user_id: &str) -> Result<(), ServiceError> {
        {
            let _guard = self.repository.lock_user(user_id).await;
            self.repository
                .delete_user(user_id)
                .await
                .map_err(|e| ServiceError::Repository("Ledger".to_string(), e.to_string()))?;
        }

        let withdrawal_channel = self.withdrawal_channel.clone();
        let user_id = user_id.to_string();

        tokio::spawn(async move {
            let _ = withdrawal_channel
                .send(WithdrawalServiceRequest::ClearHistory { user_id })
                .await;
        });

        Ok(())
    }

    // Signed credit with no lower bound: callers own the sign.
    async fn add_balance(&self, user_id: &str, amount_in_cents: i64) -> Result<User, ServiceError> {
        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        user.balance_in_cents += amount_in_cents;
        self.save_user(&mut user).await?;

        Ok(user)
    }

    async fn debit_balance(
        &self,
        user_id: &str,
        amount_in_cents: i64,
    ) -> Result<User, ServiceError> {
        if amount_in_cents <= 0 {
            return Err(ServiceError::Validation(
                "Debit amount must be positive.".to_string(),
            ));
        }

        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        if amount_in_cents > user.balance_in_cents {
            return Err(ServiceError::Validation("Insufficient balance.".to_string()));
        }

        user.balance_in_cents -= amount_in_cents;
        self.save_user(&mut user).await?;

        Ok(user)
    }

    async fn apply_referral(&self, user_id: &str, code: &str) -> Result<User, ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::Validation(
                "Referral code cannot be empty.".to_string(),
            ));
        }
        if !code.starts_with(&self.rewards.referral_code_prefix) {
            return Err(ServiceError::Validation("Invalid referral code.".to_string()));
        }

        let user = {
            let _guard = self.repository.lock_user(user_id).await;
            let mut user = self.load_user(user_id).await?;

            if user.referral_code == code {
                return Err(ServiceError::Validation(
                    "You cannot use your own referral code.".to_string(),
                ));
            }

            user.coins += self.rewards.referral_bonus_coins;
            record_coin_transaction(
                &mut user,
                CoinTransactionKind::Bonus,
                self.rewards.referral_bonus_coins,
                "Referral bonus",
            );
            self.save_user(&mut user).await?;

            user
        };

        self.credit_referrer(code, &user.id).await;

        Ok(user)
    }

    // The caller's bonus never depends on the code resolving; crediting the
    // referrer is best effort.
    async fn credit_referrer(&self, code: &str, applicant_id: &str) {
        let referrer = match self.repository.find_by_referral_code(code).await {
            Ok(referrer) => referrer,
            Err(e) => {
                log::error!("Referrer lookup failed for {}: {}", code, e);
                return;
            }
        };

        if let Some(referrer) = referrer {
            if referrer.id == applicant_id {
                return;
            }

            let _guard = self.repository.lock_user(&referrer.id).await;
            let mut referrer = match self.load_user(&referrer.id).await {
                Ok(referrer) => referrer,
                Err(_) => return,
            };

            referrer.referrals_made += 1;
            referrer.coins += self.rewards.referral_bonus_coins;
            record_coin_transaction(
                &mut referrer,
                CoinTransactionKind::Bonus,
                self.rewards.referral_bonus_coins,
                "Referral reward",
            );

            if let Err(e) = self.save_user(&mut referrer).await {
                log::error!("Could not credit referrer {}: {}", referrer.id, e);
            }
        }
    }

    async fn claim_referral_tier(
        &self,
        user_id: &str,
        tier_id: &str,
    ) -> Result<User, ServiceError> {
        let tier = self
            .rewards
            .referral_tiers
            .iter()
            .find(|tier| tier.id == tier_id)
            .ok_or_else(|| ServiceError::NotFound("Referral tier not found.".to_string()))?;

        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        if user.claimed_referral_tiers.iter().any(|id| id == tier_id) {
            return Err(ServiceError::Validation(
                "Referral tier already claimed.".to_string(),
            ));
        }
        if user.referrals_made < tier.referrals_required {
            return Err(ServiceError::Validation(
                "Not enough referrals for this tier.".to_string(),
            ));
        }

        user.claimed_referral_tiers.push(tier_id.to_string());
        user.coins += tier.reward_coins;
        record_coin_transaction(
            &mut user,
            CoinTransactionKind::Bonus,
            tier.reward_coins,
            &format!("Referral tier {}", tier_id),
        );
        self.save_user(&mut user).await?;

        Ok(user)
    }

    async fn add_coins(
        &self,
        user_id: &str,
        amount: i64,
        description: Option<String>,
    ) -> Result<User, ServiceError> {
        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        let kind = if amount >= 0 {
            CoinTransactionKind::Earned
        } else {
            CoinTransactionKind::Spent
        };

        user.coins += amount;
        record_coin_transaction(
            &mut user,
            kind,
            amount,
            description.as_deref().unwrap_or("Coins adjustment"),
        );
        self.save_user(&mut user).await?;

        Ok(user)
    }

    async fn update_coins(
        &self,
        user_id: &str,
        coins: i64,
        expected_version: Option<u64>,
    ) -> Result<User, ServiceError> {
        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        if let Some(expected) = expected_version {
            if expected != user.version {
                return Err(ServiceError::Conflict(
                    "Coin count was updated concurrently.".to_string(),
                ));
            }
        }

        let delta = coins - user.coins;
        user.coins = coins;
        record_coin_transaction(
            &mut user,
            CoinTransactionKind::Adjustment,
            delta,
            "Coin count update",
        );
        self.save_user(&mut user).await?;

        Ok(user)
    }

    async fn redeem_gift_card(
        &self,
        user_id: &str,
        card_name: &str,
        coin_cost: i64,
    ) -> Result<User, ServiceError> {
        if coin_cost <= 0 {
            return Err(ServiceError::Validation(
                "Coin cost must be positive.".to_string(),
            ));
        }

        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        if coin_cost > user.coins {
            return Err(ServiceError::Validation("Insufficient coins.".to_string()));
        }

        user.coins -= coin_cost;
        record_coin_transaction(
            &mut user,
            CoinTransactionKind::Spent,
            -coin_cost,
            &format!("Gift card: {}", card_name),
        );
        self.save_user(&mut user).await?;

        Ok(user)
    }

    async fn complete_special_offer(
        &self,
        user_id: &str,
        offer_id: &str,
        coins_earned: i64,
    ) -> Result<User, ServiceError> {
        if coins_earned <= 0 {
            return Err(ServiceError::Validation(
                "Earned coin amount must be positive.".to_string(),
            ));
        }

        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        let today = Utc::now().date_naive();
        user.roll_daily_offers(today);

        if user
            .daily_special_offers_completed_ids
            .iter()
            .any(|id| id == offer_id)
        {
            return Err(ServiceError::Validation(
                "Offer already completed today.".to_string(),
            ));
        }

        user.daily_special_offers_completed_ids
            .push(offer_id.to_string());
        user.historical_special_offers.push(SpecialOfferRecord {
            id: offer_id.to_string(),
            date_completed: today,
            coins_earned,
        });
        user.coins += coins_earned;
        record_coin_transaction(
            &mut user,
            CoinTransactionKind::Earned,
            coins_earned,
            &format!("Special offer {}", offer_id),
        );
        self.save_user(&mut user).await?;

        Ok(user)
    }

    async fn record_special_bonus_ad_watch(&self, user_id: &str) -> Result<User, ServiceError> {
        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        user.special_bonus_ads_watched += 1;

        if user.special_bonus_ads_watched >= self.rewards.special_bonus_ads_required {
            user.special_bonus_ads_watched = 0;
            user.coins += self.rewards.special_bonus_coins;
            record_coin_transaction(
                &mut user,
                CoinTransactionKind::Bonus,
                self.rewards.special_bonus_coins,
                "Special bonus ads",
            );
        }

        self.save_user(&mut user).await?;

        Ok(user)
    }

    // Merge semantics: absent fields stay untouched, supplied notification
    // flags are merged into the existing map.
    async fn update_user(&self, user_id: &str, patch: UserPatch) -> Result<User, ServiceError> {
        let _guard = self.repository.lock_user(user_id).await;
        let mut user = self.load_user(user_id).await?;

        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(app_language) = patch.app_language {
            user.app_language = app_language;
        }
        if let Some(gender) = patch.gender {
            user.gender = Some(gender);
        }
        if let Some(age_range) = patch.age_range {
            user.age_range = Some(age_range);
        }
        if let Some(contact_method) = patch.contact_method {
            user.contact_method = Some(contact_method);
        }
        if let Some(contact_detail) = patch.contact_detail {
            user.contact_detail = Some(contact_detail);
        }
        if let Some(preferences) = patch.notification_preferences {
            for (flag, enabled) in preferences {
                user.notification_preferences.insert(flag, enabled);
            }
        }

        self.save_user(&mut user).await?;

        Ok(user)
    }
}

#[async_trait]
impl RequestHandler<LedgerRequest> for LedgerRequestHandler {
    async fn handle_request(&self, request: LedgerRequest) {
        match request {
            LedgerRequest::Login {
                email,
                name,
                response,
            } => {
                let result = self.login(&email, &name).await;
                let _ = response.send(result);
            }
            LedgerRequest::Logout { user_id, response } => {
                let result = self.logout(&user_id).await;
                let _ = response.send(result);
            }
            LedgerRequest::GetUser { user_id, response } => {
                let result = self.load_user(&user_id).await;
                let _ = response.send(result);
            }
            LedgerRequest::AddBalance {
                user_id,
                amount_in_cents,
                response,
            } => {
                let result = self.add_balance(&user_id, amount_in_cents).await;
                let _ = response.send(result);
            }
            LedgerRequest::DebitBalance {
                user_id,
                amount_in_cents,
                response,
            } => {
                let result = self.debit_balance(&user_id, amount_in_cents).await;
                let _ = response.send(result);
            }
            LedgerRequest::ApplyReferral {
                user_id,
                code,
                response,
            } => {
                let result = self.apply_referral(&user_id, &code).await;
                let _ = response.send(result);
            }
            LedgerRequest::ClaimReferralTier {
                user_id,
                tier_id,
                response,
            } => {
                let result = self.claim_referral_tier(&user_id, &tier_id).await;
                let _ = response.send(result);
            }
            LedgerRequest::AddCoins {
                user_id,
                amount,
                description,
                response,
            } => {
                let result = self.add_coins(&user_id, amount, description).await;
                let _ = response.send(result);
            }
            LedgerRequest::UpdateCoins {
                user_id,
                coins,
                expected_version,
                response,
            } => {
                let result = self.update_coins(&user_id, coins, expected_version).await;
                let _ = response.send(result);
            }
            LedgerRequest::RedeemGiftCard {
                user_id,
                card_name,
                coin_cost,
                response,
            } => {
                let result = self.redeem_gift_card(&user_id, &card_name, coin_cost).await;
                let _ = response.send(result);
            }
            LedgerRequest::CompleteSpecialOffer {
                user_id,
                offer_id,
                coins_earned,
                response,
            } => {
                let result = self
                    .complete_special_offer(&user_id, &offer_id, coins_earned)
                    .await;
                let _ = response.send(result);
            }
            LedgerRequest::RecordSpecialBonusAdWatch { user_id, response } => {
                let result = self.record_special_bonus_ad_watch(&user_id).await;
                let _ = response.send(result);
            }
            LedgerRequest::UpdateUser {
                user_id,
                patch,
                response,
            } => {
                let result = self.update_user(&user_id, patch).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        LedgerService {}
    }
}

#[async_trait]
impl Service<LedgerRequest, LedgerRequestHandler> for LedgerService {}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::settings::ReferralTier;
    use crate::storage::memory::MemoryStorage;

    fn test_rewards() -> Rewards {
        Rewards {
            referral_code_prefix: "ADN-".to_string(),
            referral_bonus_coins: 250,
            min_withdrawal_in_cents: 500000,
            leaderboard_limit: 15,
            special_bonus_ads_required: 3,
            special_bonus_coins: 100,
            referral_tiers: vec![ReferralTier {
                id: "bronze".to_string(),
                referrals_required: 1,
                reward_coins: 300,
            }],
        }
    }

    fn test_handler() -> (LedgerRequestHandler, UserRepository) {
        let store: Arc<dyn crate::storage::Storage> = Arc::new(MemoryStorage::new());
        let repository = UserRepository::new(store);
        let (withdrawal_tx, _withdrawal_rx) = mpsc::channel(8);
        let handler = LedgerRequestHandler::new(repository.clone(), withdrawal_tx, test_rewards());

        (handler, repository)
    }

    #[tokio::test]
    async fn login_creates_a_fresh_profile_once() {
        let (handler, _) = test_handler();

        let user = handler.login("ana@example.com", "Ana").await.unwrap();
        assert_eq!(user.balance_in_cents, 0);
        assert_eq!(user.coins, 0);
        assert!(user.referral_code.starts_with("ADN-"));
        assert!(user.coin_transaction_history.is_empty());

        let again = handler.login("ana@example.com", "Ana").await.unwrap();
        assert_eq!(again.id, user.id);
    }

    #[tokio::test]
    async fn login_rejects_empty_email() {
        let (handler, _) = test_handler();

        assert!(matches!(
            handler.login("  ", "Ana").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn logout_removes_the_account() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();

        handler.logout(&user.id).await.unwrap();

        assert!(matches!(
            handler.load_user(&user.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn add_balance_is_signed_and_unchecked() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();

        let user = handler.add_balance(&user.id, 1250).await.unwrap();
        assert_eq!(user.balance_in_cents, 1250);

        let user = handler.add_balance(&user.id, -2000).await.unwrap();
        assert_eq!(user.balance_in_cents, -750);
    }

    #[tokio::test]
    async fn debit_balance_enforces_the_balance_floor() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();
        handler.add_balance(&user.id, 5000).await.unwrap();

        assert!(matches!(
            handler.debit_balance(&user.id, 5001).await,
            Err(ServiceError::Validation(_))
        ));
        let unchanged = handler.load_user(&user.id).await.unwrap();
        assert_eq!(unchanged.balance_in_cents, 5000);

        let user = handler.debit_balance(&user.id, 5000).await.unwrap();
        assert_eq!(user.balance_in_cents, 0);
    }

    #[tokio::test]
    async fn apply_referral_grants_the_bonus_per_call() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();

        // Prefixed codes grant the bonus whether or not they resolve.
        let user = handler.apply_referral(&user.id, "ADN-unknown1").await.unwrap();
        assert_eq!(user.coins, 250);
        assert_eq!(user.coin_transaction_history.len(), 1);
        assert_eq!(
            user.coin_transaction_history[0].kind,
            CoinTransactionKind::Bonus
        );

        // Reapplication is not prevented.
        let user = handler.apply_referral(&user.id, "ADN-unknown1").await.unwrap();
        assert_eq!(user.coins, 500);
    }

    #[tokio::test]
    async fn apply_referral_rejects_bad_and_own_codes() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();
        let own_code = user.referral_code.clone();

        assert!(matches!(
            handler.apply_referral(&user.id, "").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            handler.apply_referral(&user.id, "XYZ-12345678").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            handler.apply_referral(&user.id, &own_code).await,
            Err(ServiceError::Validation(_))
        ));

        let unchanged = handler.load_user(&user.id).await.unwrap();
        assert_eq!(unchanged.coins, 0);
        assert!(unchanged.coin_transaction_history.is_empty());
    }

    #[tokio::test]
    async fn apply_referral_credits_a_resolvable_referrer() {
        let (handler, _) = test_handler();
        let referrer = handler.login("ana@example.com", "Ana").await.unwrap();
        let friend = handler.login("bea@example.com", "Bea").await.unwrap();

        handler
            .apply_referral(&friend.id, &referrer.referral_code)
            .await
            .unwrap();

        let referrer = handler.load_user(&referrer.id).await.unwrap();
        assert_eq!(referrer.referrals_made, 1);
        assert_eq!(referrer.coins, 250);
    }

    #[tokio::test]
    async fn claim_referral_tier_requires_the_threshold_once() {
        let (handler, repository) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();

        assert!(matches!(
            handler.claim_referral_tier(&user.id, "bronze").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            handler.claim_referral_tier(&user.id, "platinum").await,
            Err(ServiceError::NotFound(_))
        ));

        let mut stored = repository.get_user(&user.id).await.unwrap().unwrap();
        stored.referrals_made = 1;
        repository.save_user(&mut stored).await.unwrap();

        let user = handler.claim_referral_tier(&user.id, "bronze").await.unwrap();
        assert_eq!(user.coins, 300);
        assert_eq!(user.claimed_referral_tiers, vec!["bronze"]);

        assert!(matches!(
            handler.claim_referral_tier(&user.id, "bronze").await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn update_coins_overwrites_and_checks_the_version() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();

        let user = handler.update_coins(&user.id, 40, None).await.unwrap();
        assert_eq!(user.coins, 40);
        assert_eq!(user.coin_transaction_history.len(), 1);
        assert_eq!(
            user.coin_transaction_history[0].kind,
            CoinTransactionKind::Adjustment
        );
        assert_eq!(user.coin_transaction_history[0].amount, 40);

        let stale = user.version - 1;
        assert!(matches!(
            handler.update_coins(&user.id, 50, Some(stale)).await,
            Err(ServiceError::Conflict(_))
        ));
        let unchanged = handler.load_user(&user.id).await.unwrap();
        assert_eq!(unchanged.coins, 40);

        let user = handler
            .update_coins(&user.id, 50, Some(unchanged.version))
            .await
            .unwrap();
        assert_eq!(user.coins, 50);
    }

    #[tokio::test]
    async fn redeem_gift_card_needs_enough_coins() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();
        handler.update_coins(&user.id, 100, None).await.unwrap();

        assert!(matches!(
            handler.redeem_gift_card(&user.id, "store-card", 150).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            handler.redeem_gift_card(&user.id, "store-card", 0).await,
            Err(ServiceError::Validation(_))
        ));

        let user = handler
            .redeem_gift_card(&user.id, "store-card", 60)
            .await
            .unwrap();
        assert_eq!(user.coins, 40);

        let redemption = user.coin_transaction_history.last().unwrap();
        assert_eq!(redemption.kind, CoinTransactionKind::Spent);
        assert_eq!(redemption.amount, -60);
    }

    #[tokio::test]
    async fn special_offers_complete_once_per_day() {
        let (handler, repository) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();

        let user = handler
            .complete_special_offer(&user.id, "offer-7", 30)
            .await
            .unwrap();
        assert_eq!(user.coins, 30);
        assert_eq!(user.daily_special_offers_completed_ids, vec!["offer-7"]);
        assert_eq!(user.historical_special_offers.len(), 1);

        assert!(matches!(
            handler.complete_special_offer(&user.id, "offer-7", 30).await,
            Err(ServiceError::Validation(_))
        ));

        // A new day clears the completion set but keeps the historical log.
        let mut stored = repository.get_user(&user.id).await.unwrap().unwrap();
        stored.daily_offers_date = stored.daily_offers_date.pred_opt().unwrap();
        repository.save_user(&mut stored).await.unwrap();

        let user = handler
            .complete_special_offer(&user.id, "offer-7", 30)
            .await
            .unwrap();
        assert_eq!(user.coins, 60);
        assert_eq!(user.historical_special_offers.len(), 2);
        assert_eq!(user.daily_special_offers_completed_ids, vec!["offer-7"]);
    }

    #[tokio::test]
    async fn bonus_ad_watches_pay_out_at_the_target() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();

        let user = handler.record_special_bonus_ad_watch(&user.id).await.unwrap();
        assert_eq!(user.special_bonus_ads_watched, 1);
        assert_eq!(user.coins, 0);

        handler.record_special_bonus_ad_watch(&user.id).await.unwrap();
        let user = handler.record_special_bonus_ad_watch(&user.id).await.unwrap();

        assert_eq!(user.special_bonus_ads_watched, 0);
        assert_eq!(user.coins, 100);
    }

    #[tokio::test]
    async fn update_user_merges_patch_fields() {
        let (handler, _) = test_handler();
        let user = handler.login("ana@example.com", "Ana").await.unwrap();

        let mut preferences = HashMap::new();
        preferences.insert("offers".to_string(), true);

        let patch = UserPatch {
            name: Some("Ana Lima".to_string()),
            app_language: Some("pt-BR".to_string()),
            notification_preferences: Some(preferences),
            ..UserPatch::default()
        };
        let user = handler.update_user(&user.id, patch).await.unwrap();

        assert_eq!(user.name, "Ana Lima");
        assert_eq!(user.app_language, "pt-BR");
        assert_eq!(user.notification_preferences.get("offers"), Some(&true));
        assert_eq!(user.gender, None);

        let mut preferences = HashMap::new();
        preferences.insert("payouts".to_string(), false);

        let patch = UserPatch {
            notification_preferences: Some(preferences),
            ..UserPatch::default()
        };
        let user = handler.update_user(&user.id, patch).await.unwrap();

        assert_eq!(user.notification_preferences.get("offers"), Some(&true));
        assert_eq!(user.notification_preferences.get("payouts"), Some(&false));
        assert_eq!(user.name, "Ana Lima");
    }
}
