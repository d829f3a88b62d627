use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use super::types::{ChartDataPoint, RewardPoint, RewardType, WalletWithBalance};

pub fn decimal_to_f64(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// USD value of a ZTC amount, rounded half up to cents.
pub fn usd_value(amount: &BigDecimal, price_usd: &BigDecimal) -> BigDecimal {
    (amount * price_usd).with_scale_round(2, RoundingMode::HalfUp)
}

/// Decimal from the shortest text form of a float price, so 0.45 stays 0.45.
/// Non-finite prices become zero.
pub fn price_to_decimal(price: f64) -> BigDecimal {
    if !price.is_finite() {
        return BigDecimal::from(0);
    }
    BigDecimal::from_str(&price.to_string()).unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Group reward points into one bucket per calendar day (UTC) over the trailing
/// `days` days ending with `today`, oldest first. Days without rewards are zero.
pub fn bucket_by_day(points: &[RewardPoint], days: u32, today: NaiveDate) -> Vec<ChartDataPoint> {
    if days == 0 {
        return Vec::new();
    }

    let start = today - Duration::days(i64::from(days) - 1);
    let mut by_day: HashMap<NaiveDate, (BigDecimal, BigDecimal)> = HashMap::new();

    for point in points {
        let day = point.timestamp.date_naive();
        if day < start || day > today {
            continue;
        }
        let bucket = by_day.entry(day).or_default();
        match point.reward_type {
            RewardType::Staking => bucket.0 += &point.amount,
            RewardType::Validator => bucket.1 += &point.amount,
        }
    }

    (0..days)
        .map(|offset| {
            let day = start + Duration::days(i64::from(offset));
            let (staking, validator) = by_day
                .get(&day)
                .map(|(s, v)| (decimal_to_f64(s), decimal_to_f64(v)))
                .unwrap_or((0.0, 0.0));

            ChartDataPoint {
                date: day.format("%Y-%m-%d").to_string(),
                staking_rewards: staking,
                validator_rewards: validator,
                total_rewards: staking + validator,
            }
        })
        .collect()
}

/// Percentage change of rewards earned in the last 24h versus the 24h before.
pub fn reward_change_24h(points: &[RewardPoint], now: DateTime<Utc>) -> f64 {
    let day_ago = now - Duration::hours(24);
    let two_days_ago = now - Duration::hours(48);

    let mut current = BigDecimal::from(0);
    let mut previous = BigDecimal::from(0);
    for point in points {
        if point.timestamp > day_ago && point.timestamp <= now {
            current += &point.amount;
        } else if point.timestamp > two_days_ago && point.timestamp <= day_ago {
            previous += &point.amount;
        }
    }

    let current = decimal_to_f64(&current);
    let previous = decimal_to_f64(&previous);

    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }

    round2((current - previous) / previous * 100.0)
}

/// Leaderboard order: highest total rewards first.
pub fn sort_by_total_rewards(wallets: &mut [WalletWithBalance]) {
    wallets.sort_by(|a, b| b.total_rewards.total_cmp(&a.total_rewards));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(reward_type: RewardType, amount: &str, at: DateTime<Utc>) -> RewardPoint {
        RewardPoint {
            reward_type,
            amount: BigDecimal::from_str(amount).unwrap(),
            timestamp: at,
        }
    }

    #[test]
    fn test_bucket_by_day_zero_fills_and_orders_oldest_first() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let points = vec![
            point(RewardType::Staking, "1.5", Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()),
            point(RewardType::Validator, "2", Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()),
            point(RewardType::Staking, "0.5", Utc.with_ymd_and_hms(2024, 3, 8, 23, 59, 59).unwrap()),
        ];

        let chart = bucket_by_day(&points, 3, today);
        assert_eq!(chart.len(), 3);
        assert_eq!(chart[0].date, "2024-03-08");
        assert_eq!(chart[1].date, "2024-03-09");
        assert_eq!(chart[2].date, "2024-03-10");

        assert_eq!(chart[0].staking_rewards, 0.5);
        assert_eq!(chart[1].total_rewards, 0.0);
        assert_eq!(chart[2].staking_rewards, 1.5);
        assert_eq!(chart[2].validator_rewards, 2.0);
        assert_eq!(chart[2].total_rewards, 3.5);
    }

    #[test]
    fn test_bucket_by_day_ignores_points_outside_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let points = vec![
            point(RewardType::Staking, "9", Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap()),
            point(RewardType::Staking, "9", Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 1).unwrap()),
        ];

        let chart = bucket_by_day(&points, 3, today);
        assert_eq!(chart.len(), 3);
        assert!(chart.iter().all(|p| p.total_rewards == 0.0));
    }

    #[test]
    fn test_bucket_by_day_length_matches_days() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for days in [1, 7, 30, 90] {
            assert_eq!(bucket_by_day(&[], days, today).len(), days as usize);
        }
        assert!(bucket_by_day(&[], 0, today).is_empty());

        let chart = bucket_by_day(&[], 2, today);
        assert_eq!(chart[0].date, "2023-12-31");
    }

    #[test]
    fn test_reward_change_24h() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let points = vec![
            point(RewardType::Staking, "3", now - Duration::hours(2)),
            point(RewardType::Staking, "2", now - Duration::hours(30)),
            point(RewardType::Staking, "100", now - Duration::hours(60)),
        ];
        assert_eq!(reward_change_24h(&points, now), 50.0);

        let only_recent = vec![point(RewardType::Validator, "1", now - Duration::hours(1))];
        assert_eq!(reward_change_24h(&only_recent, now), 100.0);
        assert_eq!(reward_change_24h(&[], now), 0.0);
    }

    #[test]
    fn test_usd_value_rounds_to_cents() {
        let amount = BigDecimal::from_str("12.345678").unwrap();
        let price = BigDecimal::from_str("0.45").unwrap();
        assert_eq!(usd_value(&amount, &price), BigDecimal::from_str("5.56").unwrap());
    }

    #[test]
    fn test_usd_value_rounds_ties_up() {
        let amount = BigDecimal::from_str("1.01").unwrap();
        let price = BigDecimal::from_str("0.5").unwrap();
        assert_eq!(usd_value(&amount, &price).to_string(), "0.51");

        let amount = BigDecimal::from_str("0.25").unwrap();
        let price = BigDecimal::from_str("0.1").unwrap();
        assert_eq!(usd_value(&amount, &price).to_string(), "0.03");
    }

    #[test]
    fn test_price_to_decimal_keeps_short_form() {
        assert_eq!(price_to_decimal(0.45).to_string(), "0.45");
        assert_eq!(price_to_decimal(0.5).to_string(), "0.5");
        assert_eq!(price_to_decimal(f64::NAN), BigDecimal::from(0));
    }
}
