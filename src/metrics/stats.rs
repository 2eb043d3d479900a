use super::Statistic;

/// Running summary of the slowlog durations (µs) of one command within one
/// minute.
///
/// Every sample is retained so the order statistics can be recomputed
/// exactly; the list is bounded by how many entries fit in one minute.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningStat {
    /// Samples in arrival order.
    pub values: Vec<u64>,
    pub count: u64,
    pub sum: u64,
    pub avg: f64,
    pub min: u64,
    pub max: u64,
    pub median: u64,
    pub p95: u64,
}

impl RunningStat {
    /// Summary of a single sample.
    pub fn new(value: u64) -> Self {
        Self {
            values: vec![value],
            count: 1,
            sum: value,
            avg: value as f64,
            min: value,
            max: value,
            median: value,
            p95: value,
        }
    }

    /// The explicit "went quiet" record used for zero padding.
    pub fn zero() -> Self {
        Self {
            values: Vec::new(),
            count: 0,
            sum: 0,
            avg: 0.0,
            min: 0,
            max: 0,
            median: 0,
            p95: 0,
        }
    }

    /// Summary of `samples` computed in one pass. `None` when empty.
    #[cfg(test)]
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        let (&first, rest) = samples.split_first()?;
        let mut stat = Self::new(first);
        for &value in rest {
            stat.add_sample(value);
        }
        Some(stat)
    }

    pub fn add_sample(&mut self, value: u64) {
        let prior_count = self.count;
        self.values.push(value);
        self.count = self.values.len() as u64;
        self.avg = (self.avg * prior_count as f64 + value as f64) / self.count as f64;

        let mut sorted = self.values.clone();
        sorted.sort_unstable();

        self.median = median(&sorted);
        self.p95 = p95(&sorted);
        self.min = sorted[0];
        self.max = sorted[sorted.len() - 1];
        self.sum = sorted.iter().sum();
    }

    /// Value reported for `statistic`.
    pub fn value(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Avg => self.avg,
            Statistic::Count => self.count as f64,
            Statistic::Median => self.median as f64,
            Statistic::Min => self.min as f64,
            Statistic::Max => self.max as f64,
            Statistic::P95 => self.p95 as f64,
        }
    }
}

// ─── Order statistics ────────────────────────────────────────────
//
// Both pick a single element of the sorted samples. The index rules below
// are what existing dashboards were built against and are kept as is: the
// "median" is element `len/2 - 1`, one below the textbook middle, and p95
// is element `trunc(len * 0.95 - 1)`. A negative index counts from the end.

/// Element `len/2 - 1` of `sorted`. Panics on an empty slice.
pub fn median(sorted: &[u64]) -> u64 {
    pick(sorted, sorted.len() as isize / 2 - 1)
}

/// Element `trunc(len * 0.95 - 1)` of `sorted`. Panics on an empty slice.
pub fn p95(sorted: &[u64]) -> u64 {
    pick(sorted, (sorted.len() as f64 * 0.95 - 1.0) as isize)
}

fn pick(sorted: &[u64], index: isize) -> u64 {
    let index = if index < 0 {
        sorted.len() as isize + index
    } else {
        index
    };
    sorted[index as usize]
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn p95_of_one_to_hundred() {
        let sorted: Vec<u64> = (1..=100).collect();
        assert_eq!(p95(&sorted), 95);
    }

    #[test]
    fn adding_a_second_sample() {
        let mut stat = RunningStat::new(10);
        stat.add_sample(20);

        assert_eq!(stat.values, vec![10, 20]);
        assert_eq!(stat.avg, 15.0);
        assert_eq!(stat.count, 2);
        assert_eq!(stat.median, 10);
        assert_eq!(stat.p95, 10);
        assert_eq!(stat.min, 10);
        assert_eq!(stat.max, 20);
        assert_eq!(stat.sum, 30);
    }

    #[test]
    fn single_sample_is_every_statistic() {
        let stat = RunningStat::new(7);
        assert_eq!(median(&stat.values), 7);
        assert_eq!(p95(&stat.values), 7);
        for statistic in Statistic::ALL {
            let expected = if statistic == Statistic::Count { 1.0 } else { 7.0 };
            assert_eq!(stat.value(statistic), expected);
        }
    }

    #[test]
    fn median_is_below_the_middle() {
        assert_eq!(median(&[1, 2, 3, 4]), 2);
        assert_eq!(median(&[1, 2, 3, 4, 5]), 2);
    }

    #[test]
    fn zero_record_reports_zero_everywhere() {
        let zero = RunningStat::zero();
        for statistic in Statistic::ALL {
            assert_eq!(zero.value(statistic), 0.0);
        }
        assert!(zero.values.is_empty());
    }

    proptest! {
        #[test]
        fn incremental_matches_sorted_aggregation(
            samples in prop::collection::vec(0u64..10_000_000, 1..200)
        ) {
            let stat = RunningStat::from_samples(&samples).unwrap();

            let mut sorted = samples.clone();
            sorted.sort_unstable();

            prop_assert_eq!(stat.count, samples.len() as u64);
            prop_assert_eq!(stat.min, sorted[0]);
            prop_assert_eq!(stat.max, *sorted.last().unwrap());
            prop_assert_eq!(stat.sum, sorted.iter().sum::<u64>());
            prop_assert_eq!(stat.median, median(&sorted));
            prop_assert_eq!(stat.p95, p95(&sorted));
            prop_assert!(stat.min <= stat.median && stat.median <= stat.max);
            prop_assert!(stat.min <= stat.p95 && stat.p95 <= stat.max);

            let mean = stat.sum as f64 / stat.count as f64;
            prop_assert!((stat.avg - mean).abs() <= mean * 1e-9 + 1e-6);
        }
    }
}
