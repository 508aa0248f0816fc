use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentorbridge_common::{AppError, AppResult, Principal, UserRole};

use crate::models::{ProfileStatus, SessionStatus};
use crate::store::{BookingStore, MentorVolume};

/// Currency precision for every stored or reported amount.
pub const CURRENCY_DP: u32 = 2;

/// Flat multiplier turning a mentor's hourly rate into the mentee-facing charge.
pub fn platform_markup() -> Decimal {
    Decimal::new(120, 2)
}

fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Highest hourly rate a mentor may set; its charge still fits `NUMERIC(12, 2)`.
pub fn max_hourly_rate() -> Decimal {
    Decimal::new(100_000_000, CURRENCY_DP)
}

/// A rate must be positive, whole cents, and no more than [`max_hourly_rate`].
pub fn validate_hourly_rate(hourly_rate: Decimal) -> AppResult<()> {
    if hourly_rate <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "Hourly rate must be positive, got {}",
            hourly_rate
        )));
    }
    if hourly_rate.normalize().scale() > CURRENCY_DP {
        return Err(AppError::Validation(format!(
            "Hourly rate must be in whole cents, got {}",
            hourly_rate
        )));
    }
    if hourly_rate > max_hourly_rate() {
        return Err(AppError::Validation(format!(
            "Hourly rate cannot exceed {}",
            max_hourly_rate()
        )));
    }
    Ok(())
}

/// `hourly_rate * 1.20`, rounded once, at booking time.
pub fn compute_charge(hourly_rate: Decimal) -> AppResult<Decimal> {
    if hourly_rate <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "Hourly rate must be positive, got {}",
            hourly_rate
        )));
    }
    let charge = hourly_rate
        .checked_mul(platform_markup())
        .map(round_currency)
        .ok_or_else(|| AppError::Validation(format!("Hourly rate {} is too large", hourly_rate)))?;
    if charge <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "Hourly rate {} rounds to a zero charge",
            hourly_rate
        )));
    }
    Ok(charge)
}

pub fn mentor_payout(amount: Decimal) -> Decimal {
    round_currency(amount / platform_markup())
}

/// Always `amount - mentor_payout(amount)`, so payout and fee add back to the amount.
pub fn platform_fee(amount: Decimal) -> Decimal {
    amount - mentor_payout(amount)
}

/// The split of a charged amount between mentor and platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueFigures {
    pub amount: Decimal,
    pub mentor_payout: Decimal,
    pub platform_fee: Decimal,
}

impl RevenueFigures {
    pub fn from_amount(amount: Decimal) -> Self {
        Self {
            amount,
            mentor_payout: mentor_payout(amount),
            platform_fee: platform_fee(amount),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsReport {
    pub mentor_id: Uuid,
    pub paid_sessions: i64,
    #[serde(flatten)]
    pub figures: RevenueFigures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRevenueReport {
    pub paid_sessions: i64,
    #[serde(flatten)]
    pub figures: RevenueFigures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub approved_mentors: i64,
    pub pending_mentors: i64,
    pub completed_sessions: i64,
    pub paid_sessions: i64,
    pub gross_volume: Decimal,
    pub platform_revenue: Decimal,
    pub mentor_payouts: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopMentor {
    pub mentor_id: Uuid,
    pub full_name: String,
    pub paid_sessions: i64,
    pub paid_volume: Decimal,
    pub payout: Decimal,
}

impl From<MentorVolume> for TopMentor {
    fn from(volume: MentorVolume) -> Self {
        Self {
            payout: mentor_payout(volume.paid_volume),
            mentor_id: volume.mentor_id,
            full_name: volume.full_name,
            paid_sessions: volume.paid_sessions,
            paid_volume: volume.paid_volume,
        }
    }
}

/// Reports money from the amounts frozen on paid sessions, never from current rates.
#[derive(Clone)]
pub struct RevenueLedger {
    store: Arc<dyn BookingStore>,
    leaderboard_limit: i64,
}

impl RevenueLedger {
    pub fn new(store: Arc<dyn BookingStore>, leaderboard_limit: i64) -> Self {
        Self {
            store,
            leaderboard_limit,
        }
    }

    pub async fn mentor_earnings(&self, principal: &Principal) -> AppResult<EarningsReport> {
        principal.require_role(UserRole::Mentor)?;
        let mentor = self
            .store
            .mentor_profile_for_user(principal.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Complete your mentor profile first".to_string()))?;
        self.earnings_for(mentor.mentor_id).await
    }

    pub async fn earnings_for(&self, mentor_id: Uuid) -> AppResult<EarningsReport> {
        let paid = self.store.paid_volume(Some(mentor_id)).await?;
        tracing::debug!("Mentor {} has {} paid sessions", mentor_id, paid.sessions);
        Ok(EarningsReport {
            mentor_id,
            paid_sessions: paid.sessions,
            figures: RevenueFigures::from_amount(paid.volume),
        })
    }

    pub async fn platform_revenue(&self, principal: &Principal) -> AppResult<PlatformRevenueReport> {
        principal.require_role(UserRole::Admin)?;
        let paid = self.store.paid_volume(None).await?;
        Ok(PlatformRevenueReport {
            paid_sessions: paid.sessions,
            figures: RevenueFigures::from_amount(paid.volume),
        })
    }

    pub async fn platform_stats(&self, principal: &Principal) -> AppResult<PlatformStats> {
        principal.require_role(UserRole::Admin)?;
        let paid = self.store.paid_volume(None).await?;
        let figures = RevenueFigures::from_amount(paid.volume);

        Ok(PlatformStats {
            approved_mentors: self.store.count_mentors(ProfileStatus::Approved).await?,
            pending_mentors: self.store.count_mentors(ProfileStatus::Pending).await?,
            completed_sessions: self.store.count_sessions(SessionStatus::Completed).await?,
            paid_sessions: paid.sessions,
            gross_volume: figures.amount,
            platform_revenue: figures.platform_fee,
            mentor_payouts: figures.mentor_payout,
        })
    }

    pub async fn top_mentors(&self, principal: &Principal) -> AppResult<Vec<TopMentor>> {
        principal.require_role(UserRole::Admin)?;
        let ranked = self.store.top_mentors_by_volume(self.leaderboard_limit).await?;
        Ok(ranked.into_iter().map(TopMentor::from).collect())
    }
}
