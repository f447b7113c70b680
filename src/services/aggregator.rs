//! Filter, sort, paginate and count over one candidate set
//!
//! The pipeline is: optional open-now filter, sort, skip, take. The total
//! count is taken after the filter and before pagination, so every page of
//! the same query reports the same count.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::models::ValidationError;
use crate::services::geo_query::GeoCandidate;

/// Fixed page size for company search
pub const PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Distance,
}

impl FromStr for SortKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "distance" => Ok(Self::Distance),
            _ => Err(ValidationError::new(
                "sortBy",
                "must be one of: name, distance",
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Distance => write!(f, "distance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ValidationError::new("sortOrder", "must be one of: asc, desc")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// Sort and page parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateQuery {
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    /// 1-based
    pub page: u32,
    pub page_size: usize,
    pub must_be_open: bool,
}

impl AggregateQuery {
    pub fn new(sort_by: SortKey, sort_order: SortOrder, page: u32, must_be_open: bool) -> Self {
        Self {
            sort_by,
            sort_order,
            page,
            page_size: PAGE_SIZE,
            must_be_open,
        }
    }

    fn skip(&self) -> usize {
        (self.page.max(1) as usize - 1).saturating_mul(self.page_size)
    }
}

/// One page of results plus the size of the whole eligible set
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated<T> {
    pub items: Vec<T>,
    pub total_count: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PaginatedAggregator;

impl PaginatedAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Run the pipeline. `is_open` is only consulted when `must_be_open` is set.
    ///
    /// Ties on the sort key are broken by ascending id whatever the order,
    /// which keeps pagination stable.
    pub fn aggregate<F>(
        &self,
        candidates: Vec<GeoCandidate>,
        query: &AggregateQuery,
        is_open: F,
    ) -> Aggregated<GeoCandidate>
    where
        F: Fn(&GeoCandidate) -> bool,
    {
        let mut eligible: Vec<GeoCandidate> = if query.must_be_open {
            candidates.into_iter().filter(|c| is_open(c)).collect()
        } else {
            candidates
        };
        let total_count = eligible.len();

        eligible.sort_by(|a, b| {
            let primary = match query.sort_by {
                SortKey::Name => a.data.name.cmp(&b.data.name),
                SortKey::Distance => a.distance.total_cmp(&b.distance),
            };
            let primary = match query.sort_order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            match primary {
                Ordering::Equal => a.id.cmp(&b.id),
                other => other,
            }
        });

        let items = eligible
            .into_iter()
            .skip(query.skip())
            .take(query.page_size)
            .collect();

        Aggregated { items, total_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::company_data;
    use proptest::prelude::*;

    fn candidate(id: i64, name: &str, distance: f64) -> GeoCandidate {
        GeoCandidate {
            id,
            data: company_data(name, 0.0, 0.0),
            distance,
        }
    }

    fn ids(page: &Aggregated<GeoCandidate>) -> Vec<i64> {
        page.items.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_parse_sort_params() {
        assert_eq!("name".parse::<SortKey>().unwrap(), SortKey::Name);
        assert_eq!("distance".parse::<SortKey>().unwrap(), SortKey::Distance);
        assert_eq!("sortBy", "rating".parse::<SortKey>().unwrap_err().path);
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!("sortOrder", "ASC".parse::<SortOrder>().unwrap_err().path);
    }

    #[test]
    fn test_sort_by_distance_both_orders() {
        let candidates = vec![
            candidate(1, "b", 300.0),
            candidate(2, "a", 100.0),
            candidate(3, "c", 200.0),
        ];
        let agg = PaginatedAggregator::new();

        let asc = agg.aggregate(
            candidates.clone(),
            &AggregateQuery::new(SortKey::Distance, SortOrder::Asc, 1, false),
            |_| true,
        );
        assert_eq!(ids(&asc), vec![2, 3, 1]);

        let desc = agg.aggregate(
            candidates,
            &AggregateQuery::new(SortKey::Distance, SortOrder::Desc, 1, false),
            |_| true,
        );
        assert_eq!(ids(&desc), vec![1, 3, 2]);
    }

    #[test]
    fn test_sort_by_name_ties_broken_by_id() {
        let candidates = vec![
            candidate(5, "same", 1.0),
            candidate(2, "same", 2.0),
            candidate(9, "alpha", 3.0),
        ];
        let agg = PaginatedAggregator::new();

        let asc = agg.aggregate(
            candidates.clone(),
            &AggregateQuery::new(SortKey::Name, SortOrder::Asc, 1, false),
            |_| true,
        );
        assert_eq!(ids(&asc), vec![9, 2, 5]);

        let desc = agg.aggregate(
            candidates,
            &AggregateQuery::new(SortKey::Name, SortOrder::Desc, 1, false),
            |_| true,
        );
        assert_eq!(ids(&desc), vec![2, 5, 9]);
    }

    #[test]
    fn test_open_filter_applies_before_count() {
        let candidates: Vec<_> = (1..=5)
            .map(|i| candidate(i, &format!("c{}", i), i as f64))
            .collect();
        let page = PaginatedAggregator::new().aggregate(
            candidates,
            &AggregateQuery::new(SortKey::Distance, SortOrder::Asc, 1, true),
            |c| c.id % 2 == 0,
        );
        assert_eq!(page.total_count, 2);
        assert_eq!(ids(&page), vec![2, 4]);
    }

    #[test]
    fn test_open_predicate_ignored_without_flag() {
        let candidates = vec![candidate(1, "a", 1.0), candidate(2, "b", 2.0)];
        let page = PaginatedAggregator::new().aggregate(
            candidates,
            &AggregateQuery::new(SortKey::Distance, SortOrder::Asc, 1, false),
            |_| false,
        );
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn test_pages_and_past_the_end() {
        let candidates: Vec<_> = (1..=60)
            .map(|i| candidate(i, "x", i as f64))
            .collect();
        let agg = PaginatedAggregator::new();
        let query = |page| AggregateQuery::new(SortKey::Distance, SortOrder::Asc, page, false);

        let p1 = agg.aggregate(candidates.clone(), &query(1), |_| true);
        let p3 = agg.aggregate(candidates.clone(), &query(3), |_| true);
        let p4 = agg.aggregate(candidates, &query(4), |_| true);

        assert_eq!(p1.items.len(), PAGE_SIZE);
        assert_eq!(p1.items[0].id, 1);
        assert_eq!(ids(&p3), (51..=60).collect::<Vec<_>>());
        assert!(p4.items.is_empty());
        assert_eq!((p1.total_count, p3.total_count, p4.total_count), (60, 60, 60));
    }

    fn arb_candidates() -> impl Strategy<Value = Vec<GeoCandidate>> {
        prop::collection::vec(
            (prop::sample::select(vec!["a", "b", "c"]), 0u32..50),
            0..80,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (name, d))| candidate(i as i64 + 1, name, d as f64))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Count does not depend on the page, and pages partition the eligible set.
        #[test]
        fn count_invariant_and_pages_partition(
            candidates in arb_candidates(),
            by_name in any::<bool>(),
            desc in any::<bool>(),
            must_be_open in any::<bool>(),
        ) {
            let agg = PaginatedAggregator::new();
            let sort_by = if by_name { SortKey::Name } else { SortKey::Distance };
            let sort_order = if desc { SortOrder::Desc } else { SortOrder::Asc };
            let is_open = |c: &GeoCandidate| c.id % 3 != 0;

            let mut seen = Vec::new();
            let mut counts = Vec::new();
            for page in 1..=5 {
                let result = agg.aggregate(
                    candidates.clone(),
                    &AggregateQuery::new(sort_by, sort_order, page, must_be_open),
                    is_open,
                );
                counts.push(result.total_count);
                seen.extend(result.items.iter().map(|c| c.id));
            }

            let expected = candidates.iter().filter(|c| !must_be_open || is_open(c)).count();
            prop_assert!(counts.iter().all(|&c| c == expected));

            let mut unique = seen.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), seen.len());
            prop_assert_eq!(seen.len(), expected.min(5 * PAGE_SIZE));
        }

        /// Identical inputs give identical pages.
        #[test]
        fn aggregation_is_deterministic(candidates in arb_candidates(), page in 1u32..4) {
            let agg = PaginatedAggregator::new();
            let query = AggregateQuery::new(SortKey::Name, SortOrder::Asc, page, false);
            let mut shuffled = candidates.clone();
            shuffled.reverse();
            prop_assert_eq!(
                agg.aggregate(candidates, &query, |_| true),
                agg.aggregate(shuffled, &query, |_| true)
            );
        }
    }
}
