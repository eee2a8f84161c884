//! Card ordering
//!
//! Missing values always sort last, whatever the direction. Ties fall back to
//! name ascending, then id, then the original position, so every ordering is
//! total and deterministic.

use crate::models::{Card, SortKey};
use chrono::{DateTime, Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;

static HOURS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*h").expect("valid hours pattern"));
static MINUTES_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*m").expect("valid minutes pattern"));
static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("valid leading number pattern"));

/// Order cards by `key`; `custom_order` only matters for `SortKey::Custom`
pub fn sort_cards(cards: Vec<Card>, key: SortKey, custom_order: &[String]) -> Vec<Card> {
    let mut indexed: Vec<(usize, Card)> = cards.into_iter().enumerate().collect();

    match key {
        SortKey::Native => {}
        SortKey::Custom => {
            let pinned: HashMap<&str, usize> = custom_order
                .iter()
                .enumerate()
                .map(|(pos, id)| (id.as_str(), pos))
                .collect();
            indexed.sort_by(|a, b| {
                match (pinned.get(a.1.id.as_str()), pinned.get(b.1.id.as_str())) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => tie_break(a, b),
                }
            });
        }
        SortKey::DateAsc | SortKey::DateDesc => {
            let desc = key == SortKey::DateDesc;
            indexed.sort_by(|a, b| {
                nulls_last(card_date(&a.1), card_date(&b.1), desc).then_with(|| tie_break(a, b))
            });
        }
        SortKey::RatingAsc | SortKey::RatingDesc => {
            let desc = key == SortKey::RatingDesc;
            indexed.sort_by(|a, b| {
                let x = a.1.rating.as_deref().and_then(parse_rating);
                let y = b.1.rating.as_deref().and_then(parse_rating);
                nulls_last_by(x, y, desc, |x, y| x.total_cmp(y)).then_with(|| tie_break(a, b))
            });
        }
        SortKey::RuntimeAsc | SortKey::RuntimeDesc => {
            let desc = key == SortKey::RuntimeDesc;
            indexed.sort_by(|a, b| {
                let x = a.1.runtime.as_deref().and_then(parse_runtime_minutes);
                let y = b.1.runtime.as_deref().and_then(parse_runtime_minutes);
                nulls_last(x, y, desc).then_with(|| tie_break(a, b))
            });
        }
        SortKey::NameAsc | SortKey::NameDesc => {
            let desc = key == SortKey::NameDesc;
            indexed.sort_by(|a, b| {
                nulls_last(name_key(&a.1), name_key(&b.1), desc)
                    .then_with(|| a.1.id.cmp(&b.1.id))
                    .then_with(|| a.0.cmp(&b.0))
            });
        }
    }

    indexed.into_iter().map(|(_, card)| card).collect()
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>, desc: bool) -> Ordering {
    nulls_last_by(a, b, desc, |x, y| x.cmp(y))
}

fn nulls_last_by<T>(
    a: Option<T>,
    b: Option<T>,
    desc: bool,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = cmp(&x, &y);
            if desc {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn tie_break(a: &(usize, Card), b: &(usize, Card)) -> Ordering {
    nulls_last(name_key(&a.1), name_key(&b.1), false)
        .then_with(|| a.1.id.cmp(&b.1.id))
        .then_with(|| a.0.cmp(&b.0))
}

fn name_key(card: &Card) -> Option<String> {
    card.name
        .as_deref()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
}

fn card_date(card: &Card) -> Option<NaiveDate> {
    card.release_date
        .as_deref()
        .and_then(parse_date)
        .or_else(|| card.year.as_deref().and_then(parse_date))
}

/// Parse RFC 3339, `YYYY-MM-DD`, `YYYY-MM` or a leading `YYYY`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d") {
        return Some(date);
    }
    let year: i32 = raw.get(..4)?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, 1, 1)?;
    (date.year() > 0).then_some(date)
}

pub fn parse_rating(raw: &str) -> Option<f64> {
    raw.trim()
        .split('/')
        .next()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
}

/// Minutes from "142 min", "2h 22min", "2h" or a bare number
pub fn parse_runtime_minutes(raw: &str) -> Option<u32> {
    let hours = HOURS_PATTERN
        .captures(raw)
        .and_then(|c| c[1].parse::<u32>().ok());
    let minutes = MINUTES_PATTERN
        .captures(raw)
        .and_then(|c| c[1].parse::<u32>().ok());

    match (hours, minutes) {
        (None, None) => LEADING_NUMBER
            .captures(raw)
            .and_then(|c| c[1].parse::<u32>().ok()),
        (h, m) => Some(h.unwrap_or(0) * 60 + m.unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, name: Option<&str>) -> Card {
        let mut card = Card::placeholder(id);
        card.name = name.map(str::to_string);
        card
    }

    fn ids(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_native_keeps_order() {
        let cards = vec![card("tt0000002", Some("B")), card("tt0000001", Some("A"))];
        let sorted = sort_cards(cards, SortKey::Native, &[]);
        assert_eq!(ids(&sorted), vec!["tt0000002", "tt0000001"]);
    }

    #[test]
    fn test_dates_nulls_last_both_directions() {
        let mut a = card("tt0000001", Some("A"));
        a.release_date = Some("1999-03-31".into());
        let mut b = card("tt0000002", Some("B"));
        b.year = Some("2005".into());
        let c = card("tt0000003", Some("C"));

        let asc = sort_cards(vec![c.clone(), b.clone(), a.clone()], SortKey::DateAsc, &[]);
        assert_eq!(ids(&asc), vec!["tt0000001", "tt0000002", "tt0000003"]);

        let desc = sort_cards(vec![a, c, b], SortKey::DateDesc, &[]);
        assert_eq!(ids(&desc), vec!["tt0000002", "tt0000001", "tt0000003"]);
    }

    #[test]
    fn test_rating_ties_break_by_name_then_id() {
        let mut a = card("tt0000002", Some("Same"));
        a.rating = Some("8.0".into());
        let mut b = card("tt0000001", Some("Same"));
        b.rating = Some("8.0".into());
        let mut c = card("tt0000003", Some("Alpha"));
        c.rating = Some("8.0".into());

        let sorted = sort_cards(vec![a, b, c], SortKey::RatingDesc, &[]);
        assert_eq!(ids(&sorted), vec!["tt0000003", "tt0000001", "tt0000002"]);
    }

    #[test]
    fn test_runtime_sort() {
        let mut a = card("tt0000001", None);
        a.runtime = Some("2h 22min".into());
        let mut b = card("tt0000002", None);
        b.runtime = Some("95 min".into());
        let sorted = sort_cards(vec![a, b], SortKey::RuntimeAsc, &[]);
        assert_eq!(ids(&sorted), vec!["tt0000002", "tt0000001"]);
    }

    #[test]
    fn test_name_desc_nulls_last() {
        let cards = vec![
            card("tt0000001", None),
            card("tt0000002", Some("apple")),
            card("tt0000003", Some("Banana")),
        ];
        let sorted = sort_cards(cards, SortKey::NameDesc, &[]);
        assert_eq!(ids(&sorted), vec!["tt0000003", "tt0000002", "tt0000001"]);
    }

    #[test]
    fn test_custom_order_pins_then_fixed_point() {
        let cards = vec![
            card("tt0000001", Some("Zed")),
            card("tt0000002", Some("Bee")),
            card("tt0000003", Some("Ant")),
            card("tt0000004", None),
        ];
        let pins = vec!["tt0000002".to_string(), "tt0000004".to_string()];

        let once = sort_cards(cards, SortKey::Custom, &pins);
        assert_eq!(
            ids(&once),
            vec!["tt0000002", "tt0000004", "tt0000003", "tt0000001"]
        );

        let twice = sort_cards(once.clone(), SortKey::Custom, &pins);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_runtime_minutes("142 min"), Some(142));
        assert_eq!(parse_runtime_minutes("2h 22min"), Some(142));
        assert_eq!(parse_runtime_minutes("2h"), Some(120));
        assert_eq!(parse_runtime_minutes("n/a"), None);

        assert_eq!(parse_rating("7.8"), Some(7.8));
        assert_eq!(parse_rating("abc"), None);

        assert_eq!(parse_date("1994-10-14T00:00:00.000Z"), NaiveDate::from_ymd_opt(1994, 10, 14));
        assert_eq!(parse_date("2001-07"), NaiveDate::from_ymd_opt(2001, 7, 1));
        assert_eq!(parse_date("2008–2013"), NaiveDate::from_ymd_opt(2008, 1, 1));
        assert_eq!(parse_date(""), None);
    }
}
