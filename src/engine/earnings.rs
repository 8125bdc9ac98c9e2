use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Deserialize;

use crate::models::driver::CompensationClass;
use crate::models::earning::{Earning, EarningStatus};

const PERMANENT_COMMISSION: f64 = 0.05;
const OLD_RATE_PER_UNIT: f64 = 30.0;
const TEMPORARY_RATE_PER_UNIT: f64 = 50.0;

pub fn compute_fee(class: CompensationClass, items_count: u32, declared_value: f64) -> f64 {
    match class {
        CompensationClass::Permanent => declared_value * PERMANENT_COMMISSION,
        CompensationClass::Old => billable_units(items_count) * OLD_RATE_PER_UNIT,
        CompensationClass::Temporary => billable_units(items_count) * TEMPORARY_RATE_PER_UNIT,
    }
}

// items are billed in pairs, rounded up; zero items yields a zero fee
fn billable_units(items_count: u32) -> f64 {
    (f64::from(items_count) / 2.0).ceil()
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Week,
    Month,
}

pub fn total(entries: &[Earning]) -> f64 {
    entries
        .iter()
        .filter(|entry| entry.status != EarningStatus::Cancelled)
        .map(|entry| entry.amount)
        .sum()
}

pub fn period_total(entries: &[Earning], period: Period, now: DateTime<Utc>) -> f64 {
    entries
        .iter()
        .filter(|entry| {
            entry.status != EarningStatus::Cancelled && in_period(entry.created_at, period, now)
        })
        .map(|entry| entry.amount)
        .sum()
}

fn in_period(created_at: DateTime<Utc>, period: Period, now: DateTime<Utc>) -> bool {
    match period {
        Period::Today => created_at.date_naive() == now.date_naive(),
        Period::Week => created_at >= now - Duration::days(7),
        Period::Month => created_at.month() == now.month() && created_at.year() == now.year(),
    }
}

pub fn average_per_delivery(entries: &[Earning], completed_deliveries: usize) -> f64 {
    if completed_deliveries == 0 {
        return 0.0;
    }

    total(entries) / completed_deliveries as f64
}
