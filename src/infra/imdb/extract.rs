//! Row-by-row extraction of movie items from IMDb list markup.
//!
//! Extraction is best-effort at two levels: a row whose required
//! structure is missing is logged and skipped without aborting the rest,
//! and an unreadable field inside an otherwise sound row degrades to its
//! unknown value (`None`, `0`, empty id).

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use select::document::Document;
use select::node::Node;
use select::predicate::{Attr, Class, Name, Predicate};
use thiserror::Error;
use tracing::warn;

use crate::domain::movies::MovieItem;

const METRIC_ROW_SKIPPED_TOTAL: &str = "marquee_extract_row_skipped_total";

static IMDB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"tt\d+").expect("static pattern"));
static RATING_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9.]+) base on ([0-9,]+) ").expect("static pattern"));

#[derive(Debug, Error)]
pub(crate) enum RowError {
    #[error("row is missing required element `{0}`")]
    MissingElement(&'static str),
}

/// Extract rows from a chart page (`.chart tbody tr`).
pub(crate) fn chart(document: &Document) -> Vec<MovieItem> {
    collect_rows(
        document.find(
            Class("chart")
                .descendant(Name("tbody"))
                .descendant(Name("tr")),
        ),
        chart_row,
    )
}

/// Extract rows from a user list page (`.lister-item`).
pub(crate) fn user_list(document: &Document) -> Vec<MovieItem> {
    collect_rows(document.find(Class("lister-item")), user_list_row)
}

fn collect_rows<'a, I, F>(rows: I, extract_row: F) -> Vec<MovieItem>
where
    I: Iterator<Item = Node<'a>>,
    F: Fn(&Node<'a>) -> Result<MovieItem, RowError>,
{
    let mut items = Vec::new();
    for (index, row) in rows.enumerate() {
        match extract_row(&row) {
            Ok(item) => items.push(item),
            Err(err) => {
                counter!(METRIC_ROW_SKIPPED_TOTAL).increment(1);
                warn!(row = index, error = %err, "skipping unreadable list row");
            }
        }
    }
    items
}

fn chart_row(row: &Node<'_>) -> Result<MovieItem, RowError> {
    let title = row
        .find(Class("titleColumn").descendant(Name("a")))
        .next()
        .ok_or(RowError::MissingElement(".titleColumn a"))?
        .text();

    let imdb_id = row
        .find(Class("posterColumn").descendant(Name("a")))
        .next()
        .and_then(|link| link.attr("href"))
        .and_then(|href| IMDB_ID.find(href))
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();

    let year = row
        .find(Class("titleColumn").descendant(Class("secondaryInfo")))
        .next()
        .and_then(|info| parse_year(&info.text()));

    let rank = data_value(row, "rk")
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|rank| *rank > 0);
    let rating = data_value(row, "ir")
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(0.0);
    let votes = data_value(row, "nv")
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MovieItem {
        imdb_id,
        title,
        year,
        rank,
        rating,
        votes,
    })
}

fn user_list_row(row: &Node<'_>) -> Result<MovieItem, RowError> {
    let link = row
        .find(Name("span").descendant(Name("a")))
        .next()
        .ok_or(RowError::MissingElement("span a"))?;
    let title = link.text();
    let imdb_id = link
        .attr("href")
        .and_then(|href| IMDB_ID.find(href))
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();

    let year = row
        .find(Class("lister-item-year"))
        .next()
        .and_then(|info| parse_year(&info.text()));

    // Rating and vote count share one "7.9 base on 1,234 ..." summary
    // attribute; when it is absent or unreadable both stay unknown.
    let (rating, votes) = row
        .find(Class("col-imdb-rating").descendant(Name("strong")))
        .next()
        .and_then(|cell| cell.attr("title"))
        .and_then(parse_rating_summary)
        .unwrap_or((0.0, 0));

    Ok(MovieItem {
        imdb_id,
        title,
        year,
        rank: None,
        rating,
        votes,
    })
}

fn data_value(row: &Node<'_>, name: &str) -> Option<String> {
    row.find(Attr("name", name))
        .next()
        .and_then(|node| node.attr("data-value"))
        .map(str::to_string)
}

/// Parse `(1994)`-style secondary info into a year.
fn parse_year(text: &str) -> Option<i32> {
    let digits = text.trim().strip_prefix('(')?.get(..4)?;
    digits.parse().ok().filter(|year| *year > 0)
}

fn parse_rating_summary(title: &str) -> Option<(f32, u64)> {
    let captures = RATING_SUMMARY.captures(title)?;
    let rating = captures.get(1)?.as_str().parse().ok()?;
    let votes = captures
        .get(2)?
        .as_str()
        .replace(',', "")
        .parse()
        .ok()?;
    Some((rating, votes))
}
