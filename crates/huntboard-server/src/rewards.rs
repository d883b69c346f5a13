//! Reward aggregation over a bounty's winning-spot configs.
//!
//! All monetary arithmetic happens on [`BigDecimal`]; floats only appear in
//! the lossy display helper. Two distinct aggregates exist on purpose: the
//! bounty list reports the first-place reward as its headline
//! `currentReward`, while detail/create/update views report the sum across
//! positions. Callers pick the aggregate matching their endpoint.

use bigdecimal::{BigDecimal, ToPrimitive, Zero};

use crate::models::WinningSpot;

/// Sum of rewards across all positions. Used by detail views.
pub fn total_reward(spots: &[WinningSpot]) -> BigDecimal {
    spots
        .iter()
        .fold(BigDecimal::zero(), |acc, spot| acc + &spot.reward)
}

/// Sum of reward caps across all positions. Used by detail views.
pub fn total_reward_cap(spots: &[WinningSpot]) -> BigDecimal {
    spots
        .iter()
        .fold(BigDecimal::zero(), |acc, spot| acc + &spot.reward_cap)
}

/// Reward of position 1, or zero when no first place is configured.
/// Used as the headline reward in list views.
pub fn first_place_reward(spots: &[WinningSpot]) -> BigDecimal {
    spots
        .iter()
        .find(|spot| spot.position == 1)
        .map(|spot| spot.reward.clone())
        .unwrap_or_else(BigDecimal::zero)
}

/// Validate a set of winning spots: positions unique and >= 1, amounts
/// non-negative, cap at least the reward.
pub fn validate_spots(spots: &[(i32, BigDecimal, BigDecimal)]) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for (position, reward, reward_cap) in spots {
        if *position < 1 {
            return Err(format!("Winning spot position must be >= 1, got {}", position));
        }
        if !seen.insert(*position) {
            return Err(format!("Duplicate winning spot position {}", position));
        }
        if reward < &BigDecimal::zero() {
            return Err("Winning spot reward cannot be negative".to_string());
        }
        if reward_cap < reward {
            return Err(format!(
                "Winning spot cap {} is below its reward {}",
                reward_cap, reward
            ));
        }
    }
    Ok(())
}

/// Lossy compact formatting for display (K/M suffixes). Never use the
/// result for storage or arithmetic.
pub fn format_compact(amount: &BigDecimal) -> String {
    let value = amount.to_f64().unwrap_or(0.0);
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{}", amount)
    }
}
