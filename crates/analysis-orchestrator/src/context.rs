//! Builds the history and peer context feature engineering needs.

use analysis_core::{Company, ValuationSnapshot};
use chrono::{Months, NaiveDate};
use feature_engineering::{discount_pct, PeerDiscount};
use valuation_engine::MultiMethodValuation;

/// Longest look-back any velocity feature uses.
pub const HISTORY_MONTHS: u32 = 6;
/// A snapshot stands in for a month only if it is at most this much older
/// than the month's anchor date.
const SNAPSHOT_TOLERANCE_DAYS: i64 = 31;

/// Resamples `history` (newest first) into one snapshot per month before
/// `as_of`, newest first. Stops at the first month with no snapshot near
/// enough, so index `k` is always `k + 1` months back.
pub fn monthly_history(
    history: &[ValuationSnapshot],
    as_of: NaiveDate,
    months: u32,
) -> Vec<ValuationSnapshot> {
    let mut monthly = Vec::with_capacity(months as usize);
    for k in 1..=months {
        let Some(anchor) = as_of.checked_sub_months(Months::new(k)) else {
            break;
        };
        let found = history
            .iter()
            .find(|s| s.valuation_date <= anchor)
            .filter(|s| (anchor - s.valuation_date).num_days() <= SNAPSHOT_TOLERANCE_DAYS);
        match found {
            Some(snapshot) => monthly.push(snapshot.clone()),
            None => break,
        }
    }
    monthly
}

/// Companies sharing `company`'s sector, excluding itself. Empty when the
/// sector is unknown.
pub fn sector_peers<'a>(company: &Company, universe: &'a [Company]) -> Vec<&'a Company> {
    let Some(sector) = company.sector.as_deref() else {
        return Vec::new();
    };
    universe
        .iter()
        .filter(|c| c.id != company.id && c.sector.as_deref() == Some(sector))
        .collect()
}

/// Discount of price to consensus value, when a price is known.
pub fn peer_discount(valuation: &MultiMethodValuation) -> Option<PeerDiscount> {
    discount_pct(valuation.current_price, valuation.consensus_valuation()).map(|discount| {
        PeerDiscount {
            company_id: valuation.company_id.clone(),
            discount,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snapshot(day: NaiveDate, value: f64) -> ValuationSnapshot {
        ValuationSnapshot {
            valuation_date: day,
            consensus_value: value,
        }
    }

    #[test]
    fn test_monthly_history_picks_latest_before_each_anchor() {
        let history = vec![
            snapshot(date(2025, 5, 28), 105.0),
            snapshot(date(2025, 5, 2), 104.0),
            snapshot(date(2025, 4, 20), 103.0),
            snapshot(date(2025, 3, 15), 101.0),
        ];
        let monthly = monthly_history(&history, date(2025, 6, 30), 6);
        let values: Vec<f64> = monthly.iter().map(|s| s.consensus_value).collect();
        // Anchors 05-30, 04-30, 03-30; nothing within a month of 02-28.
        assert_eq!(values, vec![105.0, 103.0, 101.0]);
    }

    #[test]
    fn test_monthly_history_stops_at_gap() {
        let history = vec![snapshot(date(2024, 12, 31), 90.0)];
        assert!(monthly_history(&history, date(2025, 6, 30), 6).is_empty());
    }

    #[test]
    fn test_sector_peers() {
        let company = |id: &str, sector: Option<&str>| Company {
            id: id.into(),
            symbol: id.into(),
            name: None,
            sector: sector.map(str::to_string),
        };
        let universe = vec![
            company("A", Some("Tech")),
            company("B", Some("Tech")),
            company("C", Some("Energy")),
            company("D", None),
        ];
        let peers = sector_peers(&universe[0], &universe);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id, "B");
        assert!(sector_peers(&universe[3], &universe).is_empty());
    }
}
