//! Query-parameter parsing and snapshot filtering.

use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::movies::{ListSnapshot, MovieItem};

/// Raw query parameters of a list request, exactly as they arrive on the
/// wire. Everything is an optional string; [`FilterSpec::from_query`]
/// turns them into typed bounds.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub list: Option<String>,
    pub year: Option<String>,
    pub rating: Option<String>,
    pub votes: Option<String>,
    pub rank: Option<String>,
    pub max: Option<String>,
    pub fresh: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum FilterError {
    #[error("query parameter `{field}` is not a valid {expected}: `{value}`")]
    InvalidParameter {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl FilterError {
    /// Name of the offending query parameter.
    pub fn field(&self) -> &'static str {
        match self {
            FilterError::InvalidParameter { field, .. } => field,
        }
    }
}

/// Typed filter bounds evaluated against a snapshot.
///
/// Defaults admit everything except zero-vote items: `min_votes` starts
/// at 1, which conflates "zero votes" with "votes unknown". Callers who
/// want those items must pass `votes=0` explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub min_year: i32,
    pub min_rating: f32,
    pub min_votes: u64,
    pub max_rank: u32,
    pub max_results: usize,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            min_year: 0,
            min_rating: 0.0,
            min_votes: 1,
            max_rank: u32::MAX,
            max_results: usize::MAX,
        }
    }
}

impl FilterSpec {
    /// Build a spec from raw parameters.
    ///
    /// The `fresh` shorthand is applied before `year` is parsed, so an
    /// explicit year always reassigns `min_year` and wins. A `year` with
    /// a leading `-` is a delta subtracted from `current_year`.
    /// Each field parses independently; a failure names that field.
    pub fn from_query(query: &ListQuery, current_year: i32) -> Result<Self, FilterError> {
        let mut spec = Self::default();

        if query.fresh.as_deref().is_some_and(is_truthy) {
            spec.min_year = current_year - 1;
        }

        if let Some(year) = query.year.as_deref() {
            spec.min_year = match year.strip_prefix('-') {
                Some(delta) => current_year - parse_field::<i32>("year", "year delta", delta)?,
                None => parse_field("year", "year", year)?,
            };
        }

        if let Some(rating) = query.rating.as_deref() {
            spec.min_rating = parse_field("rating", "decimal", rating)?;
        }

        if let Some(votes) = query.votes.as_deref() {
            spec.min_votes = parse_field("votes", "integer", votes)?;
        }

        if let Some(rank) = query.rank.as_deref() {
            spec.max_rank = parse_field("rank", "integer", rank)?;
        }

        if let Some(max) = query.max.as_deref() {
            spec.max_results = parse_field("max", "integer", max)?;
        }

        Ok(spec)
    }

    /// Apply the spec to a snapshot, preserving its order.
    ///
    /// Iteration stops entirely once `max_results` items are included;
    /// the remaining tail is never evaluated.
    pub fn evaluate(&self, snapshot: &ListSnapshot) -> Vec<MovieItem> {
        let mut included = Vec::new();
        for item in &snapshot.items {
            if included.len() >= self.max_results {
                break;
            }
            if self.matches(item) {
                included.push(item.clone());
            }
        }
        included
    }

    fn matches(&self, item: &MovieItem) -> bool {
        // Unknown year collapses to 0 (fails any positive min_year);
        // unknown rank collapses to 0 (passes any max_rank).
        item.year.unwrap_or(0) >= self.min_year
            && item.rating >= self.min_rating
            && item.votes >= self.min_votes
            && item.rank.unwrap_or(0) <= self.max_rank
    }
}

fn parse_field<T: FromStr>(
    field: &'static str,
    expected: &'static str,
    value: &str,
) -> Result<T, FilterError> {
    value.parse().map_err(|_| FilterError::InvalidParameter {
        field,
        expected,
        value: value.to_string(),
    })
}

fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::list_key::{ChartKind, ListKey};

    const CURRENT_YEAR: i32 = 2024;

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let mut query = ListQuery::default();
        for (name, value) in pairs {
            let slot = match *name {
                "list" => &mut query.list,
                "year" => &mut query.year,
                "rating" => &mut query.rating,
                "votes" => &mut query.votes,
                "rank" => &mut query.rank,
                "max" => &mut query.max,
                "fresh" => &mut query.fresh,
                other => panic!("unknown query field {other}"),
            };
            *slot = Some(value.to_string());
        }
        query
    }

    fn item(title: &str, year: Option<i32>, rank: Option<u32>, rating: f32, votes: u64) -> MovieItem {
        MovieItem {
            imdb_id: format!("tt{:07}", title.len()),
            title: title.to_string(),
            year,
            rank,
            rating,
            votes,
        }
    }

    fn snapshot(items: Vec<MovieItem>) -> ListSnapshot {
        ListSnapshot::new(ListKey::Chart(ChartKind::Popular), items)
    }

    #[test]
    fn defaults_when_no_parameters() {
        let spec = FilterSpec::from_query(&ListQuery::default(), CURRENT_YEAR).unwrap();
        assert_eq!(spec, FilterSpec::default());
        assert_eq!(spec.min_votes, 1);
    }

    #[test]
    fn absolute_year() {
        let spec = FilterSpec::from_query(&query(&[("year", "1999")]), CURRENT_YEAR).unwrap();
        assert_eq!(spec.min_year, 1999);
    }

    #[test]
    fn year_delta_subtracts_from_current_year() {
        let spec = FilterSpec::from_query(&query(&[("year", "-5")]), CURRENT_YEAR).unwrap();
        assert_eq!(spec.min_year, 2019);
    }

    #[test]
    fn fresh_means_last_year() {
        let spec = FilterSpec::from_query(&query(&[("fresh", "True")]), CURRENT_YEAR).unwrap();
        assert_eq!(spec.min_year, 2023);
    }

    #[test]
    fn explicit_year_wins_over_fresh() {
        let spec =
            FilterSpec::from_query(&query(&[("fresh", "True"), ("year", "2010")]), CURRENT_YEAR)
                .unwrap();
        assert_eq!(spec.min_year, 2010);
    }

    #[test]
    fn non_truthy_fresh_is_ignored() {
        let spec = FilterSpec::from_query(&query(&[("fresh", "no")]), CURRENT_YEAR).unwrap();
        assert_eq!(spec.min_year, 0);
    }

    #[test]
    fn each_numeric_field_overrides_its_default() {
        let spec = FilterSpec::from_query(
            &query(&[("rating", "7.5"), ("votes", "1000"), ("rank", "50"), ("max", "10")]),
            CURRENT_YEAR,
        )
        .unwrap();
        assert_eq!(spec.min_rating, 7.5);
        assert_eq!(spec.min_votes, 1000);
        assert_eq!(spec.max_rank, 50);
        assert_eq!(spec.max_results, 10);
    }

    #[test]
    fn parse_errors_name_the_field() {
        for (field, value) in [
            ("year", "soon"),
            ("rating", "high"),
            ("votes", "many"),
            ("rank", "first"),
            ("max", "all"),
        ] {
            let err = FilterSpec::from_query(&query(&[(field, value)]), CURRENT_YEAR)
                .expect_err("parse should fail");
            assert_eq!(err.field(), field, "wrong field for value `{value}`");
        }
    }

    #[test]
    fn bare_minus_year_is_rejected() {
        let err = FilterSpec::from_query(&query(&[("year", "-")]), CURRENT_YEAR)
            .expect_err("parse should fail");
        assert_eq!(err.field(), "year");
    }

    #[test]
    fn evaluation_preserves_snapshot_order() {
        let snapshot = snapshot(vec![
            item("c", Some(2020), Some(3), 6.0, 10),
            item("a", Some(2021), Some(1), 7.0, 10),
            item("b", Some(2022), Some(2), 8.0, 10),
        ]);
        let titles: Vec<String> = FilterSpec::default()
            .evaluate(&snapshot)
            .into_iter()
            .map(|item| item.title)
            .collect();
        assert_eq!(titles, ["c", "a", "b"]);
    }

    #[test]
    fn every_included_item_satisfies_all_predicates() {
        let spec = FilterSpec {
            min_year: 2000,
            min_rating: 7.0,
            min_votes: 100,
            max_rank: 10,
            ..FilterSpec::default()
        };
        let snapshot = snapshot(vec![
            item("old", Some(1999), Some(1), 9.0, 500),
            item("low-rated", Some(2010), Some(2), 6.9, 500),
            item("few-votes", Some(2010), Some(3), 9.0, 99),
            item("deep-rank", Some(2010), Some(11), 9.0, 500),
            item("keeper", Some(2010), Some(4), 7.0, 100),
        ]);
        let included = spec.evaluate(&snapshot);
        assert_eq!(included.len(), 1);
        assert_eq!(included[0].title, "keeper");
    }

    #[test]
    fn default_votes_threshold_excludes_unknown_vote_counts() {
        let snapshot = snapshot(vec![
            item("unknown-votes", Some(2020), None, 8.0, 0),
            item("voted", Some(2020), None, 8.0, 1),
        ]);

        let included = FilterSpec::default().evaluate(&snapshot);
        assert_eq!(included.len(), 1);
        assert_eq!(included[0].title, "voted");

        let spec = FilterSpec::from_query(&query(&[("votes", "0")]), CURRENT_YEAR).unwrap();
        assert_eq!(spec.evaluate(&snapshot).len(), 2);
    }

    #[test]
    fn unknown_year_fails_positive_min_year() {
        let spec = FilterSpec {
            min_year: 1900,
            ..FilterSpec::default()
        };
        let snapshot = snapshot(vec![item("undated", None, None, 8.0, 10)]);
        assert!(spec.evaluate(&snapshot).is_empty());
    }

    #[test]
    fn unknown_rank_passes_any_max_rank() {
        let spec = FilterSpec {
            max_rank: 1,
            ..FilterSpec::default()
        };
        let snapshot = snapshot(vec![item("unranked", Some(2020), None, 8.0, 10)]);
        assert_eq!(spec.evaluate(&snapshot).len(), 1);
    }

    #[test]
    fn max_zero_yields_empty_result() {
        let spec = FilterSpec {
            max_results: 0,
            ..FilterSpec::default()
        };
        let snapshot = snapshot(vec![item("match", Some(2020), Some(1), 8.0, 10)]);
        assert!(spec.evaluate(&snapshot).is_empty());
    }

    #[test]
    fn truncation_is_early_not_a_tail_filter() {
        let spec = FilterSpec {
            max_results: 2,
            ..FilterSpec::default()
        };
        let snapshot = snapshot(vec![
            item("first", Some(2020), Some(1), 8.0, 10),
            item("second", Some(2020), Some(2), 8.0, 10),
            item("third", Some(2020), Some(3), 8.0, 10),
        ]);
        let titles: Vec<String> = spec
            .evaluate(&snapshot)
            .into_iter()
            .map(|item| item.title)
            .collect();
        assert_eq!(titles, ["first", "second"]);
    }

    #[test]
    fn result_never_exceeds_snapshot_or_bound() {
        let snapshot = snapshot(vec![
            item("one", Some(2020), None, 5.0, 10),
            item("two", Some(2020), None, 5.0, 10),
        ]);
        let spec = FilterSpec {
            max_results: 100,
            ..FilterSpec::default()
        };
        assert_eq!(spec.evaluate(&snapshot).len(), 2);
    }
}
