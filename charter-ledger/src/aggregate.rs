//! Pure aggregations over a set of payments.
//!
//! Every total is keyed by currency first; amounts in different currencies
//! are never added together. Results use ordered maps and read no clock, so
//! the same input always produces the same output.

use charter_core::{CoreError, CoreResult};
use charter_shared::{CurrencyCode, Decimal, PaymentMethod, PaymentStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Payment;

const MAX_BUCKETS: i64 = 10_000;

/// Half-open interval `[from, to)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> CoreResult<Self> {
        if from >= to {
            return Err(CoreError::ValidationError(format!(
                "window start {} must be before end {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at < self.to
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Total {
    pub amount: Decimal,
    pub count: usize,
}

impl Total {
    fn add(&mut self, amount: Decimal) -> CoreResult<()> {
        self.amount = self.amount.checked_add(amount).ok_or_else(|| {
            CoreError::ValidationError(format!(
                "total {} + {} overflows the decimal range",
                self.amount, amount
            ))
        })?;
        self.count += 1;
        Ok(())
    }
}

pub type PerCurrency<K> = BTreeMap<CurrencyCode, BTreeMap<K, Total>>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Hour,
    Day,
    Week,
}

impl Bucket {
    pub fn width(&self) -> Duration {
        match self {
            Bucket::Hour => Duration::hours(1),
            Bucket::Day => Duration::days(1),
            Bucket::Week => Duration::weeks(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub bucket_start: DateTime<Utc>,
    pub totals: BTreeMap<CurrencyCode, Total>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerSummary {
    pub window: Option<TimeWindow>,
    pub by_status: PerCurrency<PaymentStatus>,
    pub by_method: PerCurrency<PaymentMethod>,
}

fn group_by<K: Ord>(
    payments: &[Payment],
    key: impl Fn(&Payment) -> K,
) -> CoreResult<PerCurrency<K>> {
    let mut totals: PerCurrency<K> = BTreeMap::new();
    for payment in payments {
        totals
            .entry(payment.currency.clone())
            .or_default()
            .entry(key(payment))
            .or_default()
            .add(payment.amount)?;
    }
    Ok(totals)
}

pub fn sum_by_status(payments: &[Payment]) -> CoreResult<PerCurrency<PaymentStatus>> {
    group_by(payments, |p| p.status)
}

/// Completed payments only; pending and failed money has not moved.
pub fn sum_by_method(payments: &[Payment]) -> CoreResult<PerCurrency<PaymentMethod>> {
    let completed: Vec<Payment> = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .cloned()
        .collect();
    group_by(&completed, |p| p.method)
}

pub fn summarize(payments: &[Payment], window: Option<TimeWindow>) -> CoreResult<LedgerSummary> {
    let scoped: Vec<Payment> = match &window {
        Some(w) => payments.iter().filter(|p| w.contains(p.created_at)).cloned().collect(),
        None => payments.to_vec(),
    };
    Ok(LedgerSummary {
        window,
        by_status: sum_by_status(&scoped)?,
        by_method: sum_by_method(&scoped)?,
    })
}

/// Per-bucket totals of payments with `status`, one point per bucket in the
/// window including empty ones.
pub fn time_series(
    payments: &[Payment],
    window: &TimeWindow,
    bucket: Bucket,
    status: PaymentStatus,
) -> CoreResult<Vec<SeriesPoint>> {
    let width = bucket.width().num_seconds();
    let span = (window.to - window.from).num_seconds();
    let bucket_count = (span + width - 1) / width;
    if bucket_count > MAX_BUCKETS {
        return Err(CoreError::ValidationError(format!(
            "window spans {} buckets, limit is {}",
            bucket_count, MAX_BUCKETS
        )));
    }

    let mut points: Vec<SeriesPoint> = (0..bucket_count)
        .map(|i| SeriesPoint {
            bucket_start: window.from + Duration::seconds(i * width),
            totals: BTreeMap::new(),
        })
        .collect();

    for payment in payments {
        if payment.status != status || !window.contains(payment.created_at) {
            continue;
        }
        let index = (payment.created_at - window.from).num_seconds() / width;
        if let Some(point) = usize::try_from(index).ok().and_then(|i| points.get_mut(i)) {
            point
                .totals
                .entry(payment.currency.clone())
                .or_default()
                .add(payment.amount)?;
        }
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPayment;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn payment(
        amount: Decimal,
        currency: &str,
        method: PaymentMethod,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
    ) -> Payment {
        NewPayment {
            user_id: Uuid::new_v4(),
            booking_id: None,
            amount,
            currency: CurrencyCode::new(currency).unwrap(),
            method,
            status,
            transaction_ref: None,
            created_at: Some(created_at),
        }
        .into_payment(created_at)
    }

    fn sample() -> Vec<Payment> {
        vec![
            payment(dec!(42000), "EUR", PaymentMethod::Bank, PaymentStatus::Completed, at(1)),
            payment(dec!(8000), "EUR", PaymentMethod::Card, PaymentStatus::Completed, at(2)),
            payment(dec!(500), "EUR", PaymentMethod::Card, PaymentStatus::Failed, at(2)),
            payment(dec!(31000), "USD", PaymentMethod::Crypto, PaymentStatus::Completed, at(5)),
            payment(dec!(1200), "USD", PaymentMethod::Card, PaymentStatus::Pending, at(7)),
        ]
    }

    #[test]
    fn test_sum_by_status_keeps_currencies_apart() {
        let totals = sum_by_status(&sample()).unwrap();
        let eur = CurrencyCode::new("EUR").unwrap();
        let usd = CurrencyCode::new("USD").unwrap();

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&eur][&PaymentStatus::Completed].amount, dec!(50000));
        assert_eq!(totals[&eur][&PaymentStatus::Completed].count, 2);
        assert_eq!(totals[&eur][&PaymentStatus::Failed].amount, dec!(500));
        assert_eq!(totals[&usd][&PaymentStatus::Completed].amount, dec!(31000));
        assert_eq!(totals[&usd][&PaymentStatus::Pending].amount, dec!(1200));
    }

    #[test]
    fn test_sum_by_method_counts_completed_only() {
        let totals = sum_by_method(&sample()).unwrap();
        let eur = CurrencyCode::new("EUR").unwrap();

        assert_eq!(totals[&eur][&PaymentMethod::Card].amount, dec!(8000));
        assert_eq!(totals[&eur][&PaymentMethod::Bank].amount, dec!(42000));
        assert!(!totals.contains_key(&CurrencyCode::new("GBP").unwrap()));
    }

    #[test]
    fn test_aggregates_are_deterministic() {
        let payments = sample();
        let mut reversed = payments.clone();
        reversed.reverse();

        assert_eq!(
            summarize(&payments, None).unwrap(),
            summarize(&reversed, None).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&summarize(&payments, None).unwrap()).unwrap(),
            serde_json::to_string(&summarize(&payments, None).unwrap()).unwrap()
        );
    }

    #[test]
    fn test_time_series_buckets() {
        let window = TimeWindow::new(at(0), at(6)).unwrap();
        let series = time_series(&sample(), &window, Bucket::Hour, PaymentStatus::Completed).unwrap();
        let eur = CurrencyCode::new("EUR").unwrap();
        let usd = CurrencyCode::new("USD").unwrap();

        assert_eq!(series.len(), 6);
        assert!(series[0].totals.is_empty());
        assert_eq!(series[1].totals[&eur].amount, dec!(42000));
        assert_eq!(series[2].totals[&eur].amount, dec!(8000));
        assert_eq!(series[5].totals[&usd].amount, dec!(31000));
        assert_eq!(series[5].bucket_start, at(5));
    }

    #[test]
    fn test_summarize_respects_window() {
        let window = TimeWindow::new(at(0), at(3)).unwrap();
        let summary = summarize(&sample(), Some(window)).unwrap();
        assert!(!summary.by_status.contains_key(&CurrencyCode::new("USD").unwrap()));
    }

    #[test]
    fn test_invalid_windows_rejected() {
        assert!(TimeWindow::new(at(3), at(3)).is_err());

        let huge = TimeWindow::new(at(0), at(0) + Duration::days(3650)).unwrap();
        let result = time_series(&[], &huge, Bucket::Hour, PaymentStatus::Completed);
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_overflowing_totals_are_errors() {
        let huge = vec![
            payment(Decimal::MAX, "EUR", PaymentMethod::Card, PaymentStatus::Completed, at(1)),
            payment(Decimal::MAX, "EUR", PaymentMethod::Card, PaymentStatus::Completed, at(1)),
        ];
        let window = TimeWindow::new(at(0), at(2)).unwrap();

        assert!(matches!(summarize(&huge, None), Err(CoreError::ValidationError(_))));
        assert!(matches!(
            time_series(&huge, &window, Bucket::Hour, PaymentStatus::Completed),
            Err(CoreError::ValidationError(_))
        ));
    }
}
