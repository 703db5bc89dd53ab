use chrono::{Days, NaiveDate};

use crate::domain::{BulletinCandidate, Cycle, Region};

/// How many calendar days the fallback search covers: today and yesterday.
const DATE_OFFSETS: u64 = 2;

/// Flat, priority-ordered candidate list for one region: dates in ascending
/// offset from today, and within a date the configured cycles scanned in
/// reverse (most recent first). The consumer stops at the first candidate
/// that yields a non-empty normalized table, so an earlier-scanned hit is
/// never revisited in favor of a later one.
pub fn candidates_for(region: &Region, today: NaiveDate, cycles: &[Cycle]) -> Vec<BulletinCandidate> {
    let mut candidates = Vec::with_capacity(DATE_OFFSETS as usize * cycles.len());
    for offset in 0..DATE_OFFSETS {
        let Some(date) = today.checked_sub_days(Days::new(offset)) else {
            continue;
        };
        for cycle in cycles.iter().rev() {
            candidates.push(BulletinCandidate {
                region: region.clone(),
                date,
                cycle: *cycle,
            });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycles() -> Vec<Cycle> {
        ["00", "06", "12", "18"]
            .iter()
            .map(|value| value.parse().unwrap())
            .collect()
    }

    #[test]
    fn cycles_scan_descending_within_a_date() {
        let region: Region = "atlgulf".parse().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let candidates = candidates_for(&region, today, &cycles());

        let today_hours: Vec<u8> = candidates
            .iter()
            .filter(|candidate| candidate.date == today)
            .map(|candidate| candidate.cycle.hour())
            .collect();
        assert_eq!(today_hours, [18, 12, 6, 0]);
    }

    #[test]
    fn today_is_scanned_before_yesterday() {
        let region: Region = "atlgulf".parse().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let candidates = candidates_for(&region, today, &cycles());

        assert_eq!(candidates.len(), 8);
        assert!(candidates[..4].iter().all(|candidate| candidate.date == today));
        assert!(candidates[4..].iter().all(|candidate| candidate.date == yesterday));
    }

    #[test]
    fn no_dates_beyond_yesterday() {
        let region: Region = "atlgulf".parse().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let candidates = candidates_for(&region, today, &cycles());
        let oldest = candidates.iter().map(|candidate| candidate.date).min().unwrap();
        assert_eq!(oldest, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
