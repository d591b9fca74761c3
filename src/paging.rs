use std::collections::HashMap;

use serde_json::json;
use thiserror::Error;

use crate::logging::logger;
use crate::vtuner::{Item, Page};

const OFFSET_KEYS: [&str; 3] = ["startitems", "startItems", "start"];
const END_KEYS: [&str; 2] = ["enditems", "endItems"];
const HOW_MANY_KEY: &str = "howmany";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PagingError {
    #[error("invalid paging offset {0:?}")]
    InvalidOffset(String),
    #[error("invalid paging limit {0:?}")]
    InvalidLimit(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Limit {
    End(String),
    HowMany(String),
}

/// Paging parameters as sent by the receiver. Devices disagree on spelling,
/// the first non-empty spelling wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagingParams {
    start: Option<String>,
    limit: Option<Limit>,
}

impl PagingParams {
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let limit = first_value(params, &END_KEYS)
            .map(Limit::End)
            .or_else(|| first_value(params, &[HOW_MANY_KEY]).map(Limit::HowMany));

        Self {
            start: first_value(params, &OFFSET_KEYS),
            limit,
        }
    }

    fn offset(&self) -> Result<usize, PagingError> {
        match &self.start {
            Some(raw) => parse_int(raw)
                .map(|start| clamp(start.saturating_sub(1)))
                .ok_or_else(|| PagingError::InvalidOffset(raw.clone())),
            None => Ok(0),
        }
    }

    fn limit(&self, offset: usize, total: usize) -> Result<usize, PagingError> {
        let limit = match &self.limit {
            Some(Limit::End(raw)) => {
                parse_int(raw).ok_or_else(|| PagingError::InvalidLimit(raw.clone()))?
            }
            Some(Limit::HowMany(raw)) => parse_int(raw)
                .map(|count| (offset as i64).saturating_add(count))
                .ok_or_else(|| PagingError::InvalidLimit(raw.clone()))?,
            None => total as i64,
        };
        Ok(clamp(limit))
    }
}

/// Slices `items` according to `params`. Out-of-range windows are empty, not errors.
pub fn window<'a, T>(items: &'a [T], params: &PagingParams) -> Result<&'a [T], PagingError> {
    let offset = params.offset()?;
    if offset >= items.len() {
        logger().warn(
            "paging.offset_out_of_range",
            json!({ "offset": offset, "total": items.len() }),
        );
        return Ok(&[]);
    }

    let limit = params.limit(offset, items.len())?;
    if limit <= offset {
        logger().warn(
            "paging.limit_before_offset",
            json!({ "offset": offset, "limit": limit }),
        );
        return Ok(&[]);
    }

    Ok(&items[offset..limit.min(items.len())])
}

/// Builds a page over the whole sequence, declaring its unwindowed length.
pub fn paged<T, F>(
    items: &[T],
    params: &PagingParams,
    empty_message: &str,
    mut render: F,
) -> Result<Page, PagingError>
where
    F: FnMut(&T) -> Item,
{
    if items.is_empty() {
        return Ok(Page::message(empty_message));
    }

    let mut page = Page::new();
    for item in window(items, params)? {
        page.add(render(item));
    }
    page.set_count(items.len());
    Ok(page)
}

fn first_value(params: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .find(|value| !value.is_empty())
        .cloned()
}

// Integers too large for i64 saturate; only non-numeric text is rejected.
fn parse_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse() {
        return Some(value);
    }
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

fn clamp(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> PagingParams {
        let query = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        PagingParams::from_query(&query)
    }

    fn ten() -> Vec<u32> {
        (0..10).collect()
    }

    #[test]
    fn no_parameters_return_everything() {
        let items = ten();
        assert_eq!(window(&items, &PagingParams::default()).unwrap(), &items[..]);
    }

    #[test]
    fn start_is_one_based() {
        let items = ten();
        let slice = window(&items, &params(&[("startitems", "4")])).unwrap();
        assert_eq!(slice, &items[3..10]);
        assert_eq!(slice.len(), 7);
    }

    #[test]
    fn every_spelling_is_accepted() {
        let items = ten();
        for key in ["startitems", "startItems", "start"] {
            assert_eq!(window(&items, &params(&[(key, "2")])).unwrap(), &items[1..]);
        }
        for key in ["enditems", "endItems"] {
            assert_eq!(window(&items, &params(&[(key, "3")])).unwrap(), &items[..3]);
        }
        assert_eq!(
            window(&items, &params(&[("startitems", "3"), ("howmany", "4")])).unwrap(),
            &items[2..6]
        );
    }

    #[test]
    fn earlier_spelling_wins_and_empty_values_are_skipped() {
        let items = ten();
        assert_eq!(
            window(&items, &params(&[("startitems", "5"), ("start", "2")])).unwrap(),
            &items[4..]
        );
        assert_eq!(
            window(&items, &params(&[("startitems", ""), ("start", "2")])).unwrap(),
            &items[1..]
        );
        assert_eq!(
            window(&items, &params(&[("enditems", "2"), ("howmany", "8")])).unwrap(),
            &items[..2]
        );
    }

    #[test]
    fn offset_beyond_length_is_empty_not_an_error() {
        let items = ten();
        assert!(window(&items, &params(&[("startitems", "15")]))
            .unwrap()
            .is_empty());
        assert!(window(&items, &params(&[("startitems", "11")]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn large_offset_short_circuits_before_the_limit_is_read() {
        let items = ten();
        assert!(
            window(&items, &params(&[("startitems", "40"), ("enditems", "oops")]))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn negative_values_clamp_to_zero() {
        let items = ten();
        assert_eq!(window(&items, &params(&[("startitems", "-3")])).unwrap(), &items[..]);
        assert_eq!(window(&items, &params(&[("startitems", "0")])).unwrap(), &items[..]);
        assert!(window(&items, &params(&[("enditems", "-1")])).unwrap().is_empty());
    }

    #[test]
    fn limit_before_offset_is_empty() {
        let items = ten();
        assert!(window(&items, &params(&[("startitems", "6"), ("enditems", "3")]))
            .unwrap()
            .is_empty());
        assert!(window(&items, &params(&[("startitems", "6"), ("howmany", "0")]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn limit_past_the_end_is_clamped() {
        let items = ten();
        assert_eq!(
            window(&items, &params(&[("startitems", "9"), ("enditems", "100")])).unwrap(),
            &items[8..]
        );
    }

    #[test]
    fn unparseable_values_are_client_errors() {
        let items = ten();
        assert_eq!(
            window(&items, &params(&[("startitems", "abc")])),
            Err(PagingError::InvalidOffset("abc".into()))
        );
        assert_eq!(
            window(&items, &params(&[("enditems", "1.5")])),
            Err(PagingError::InvalidLimit("1.5".into()))
        );
        assert_eq!(
            window(&items, &params(&[("howmany", "many")])),
            Err(PagingError::InvalidLimit("many".into()))
        );
    }

    #[test]
    fn oversized_integers_saturate_instead_of_failing() {
        let items = ten();
        assert!(window(&items, &params(&[("startitems", "99999999999999999999")]))
            .unwrap()
            .is_empty());
        assert_eq!(
            window(&items, &params(&[("startitems", "-99999999999999999999")])).unwrap(),
            &items[..]
        );
        assert_eq!(
            window(&items, &params(&[("startitems", "2"), ("enditems", "99999999999999999999")]))
                .unwrap(),
            &items[1..]
        );
        assert_eq!(
            window(&items, &params(&[("startitems", "2"), ("howmany", "99999999999999999999")]))
                .unwrap(),
            &items[1..]
        );
        assert!(window(&items, &params(&[("enditems", "-99999999999999999999")]))
            .unwrap()
            .is_empty());
        assert_eq!(
            window(&items, &params(&[("startitems", "9999999999999999999x")])),
            Err(PagingError::InvalidOffset("9999999999999999999x".into()))
        );
        assert_eq!(
            window(&items, &params(&[("startitems", "-")])),
            Err(PagingError::InvalidOffset("-".into()))
        );
    }

    #[test]
    fn whitespace_and_signs_parse() {
        let items = ten();
        assert_eq!(window(&items, &params(&[("startitems", " +2 ")])).unwrap(), &items[1..]);
    }

    #[test]
    fn paged_declares_the_full_length() {
        let items = ten();
        let page = paged(&items, &params(&[("startitems", "4")]), "No entries found", |n| {
            Item::display(n.to_string())
        })
        .unwrap();
        assert_eq!(page.items().len(), 7);
        assert_eq!(page.count(), Some(10));
        assert_eq!(page.items()[0], Item::display("3"));
    }

    #[test]
    fn paged_out_of_range_keeps_the_declared_length() {
        let items = ten();
        let page = paged(&items, &params(&[("startitems", "15")]), "No entries found", |n| {
            Item::display(n.to_string())
        })
        .unwrap();
        assert!(page.items().is_empty());
        assert_eq!(page.count(), Some(10));
    }

    #[test]
    fn paged_empty_source_is_a_single_message() {
        let items: Vec<u32> = Vec::new();
        let page = paged(&items, &params(&[("startitems", "abc")]), "No stations found", |n| {
            Item::display(n.to_string())
        })
        .unwrap();
        assert_eq!(page.items(), &[Item::display("No stations found")]);
        assert_eq!(page.count(), Some(1));
    }
}
