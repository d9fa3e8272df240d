use std::cmp::Ordering;

use serde::Deserialize;

use crate::config::DiscoveryConfig;
use crate::models::{Candidate, PageInfo};

/// Ordering of the discovery feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Most recently active or created first
    #[default]
    Recent,
    /// Nearest first; candidates without a distance last
    Distance,
    /// Candidates who already liked the requester first, then by recency
    LikedMe,
}

impl SortKey {
    /// Lenient parse of the `sort` query parameter
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "recent" | "newest" | "recency" | "active" => Some(SortKey::Recent),
            "distance" | "nearest" | "closest" => Some(SortKey::Distance),
            "liked_me" | "likes_you" | "liked" => Some(SortKey::LikedMe),
            _ => None,
        }
    }
}

/// Offset/limit window, always bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    /// Missing or zero limit falls back to the default page size; anything
    /// above the maximum is clamped to it.
    pub fn clamped(offset: Option<usize>, limit: Option<usize>, config: &DiscoveryConfig) -> Self {
        let limit = match limit {
            None | Some(0) => config.default_page_size,
            Some(n) => n.min(config.max_page_size),
        };
        Self {
            offset: offset.unwrap_or(0),
            limit,
        }
    }
}

/// One page of the ranked candidate list
#[derive(Debug, Clone)]
pub struct DiscoveryPage {
    pub candidates: Vec<Candidate>,
    pub info: PageInfo,
}

/// Sort in place. Every key ends with a user ID tiebreak so identical
/// inputs always produce identical orders.
pub fn sort_candidates(candidates: &mut [Candidate], key: SortKey) {
    candidates.sort_by(|a, b| {
        let primary = match key {
            SortKey::Recent => by_recency(a, b),
            SortKey::Distance => by_distance(a, b),
            SortKey::LikedMe => b
                .has_liked_me
                .cmp(&a.has_liked_me)
                .then_with(|| by_recency(a, b)),
        };
        primary.then_with(|| a.user_id().cmp(&b.user_id()))
    });
}

/// Cut a sorted prefix of the eligible set to the requested window.
///
/// `candidates` starts at position 0 of the feed but may stop short of
/// `total` when only the rows up to the window end were loaded.
pub fn paginate(candidates: Vec<Candidate>, page: PageRequest, total: usize) -> DiscoveryPage {
    let total = total.max(candidates.len());
    let end = page.offset.saturating_add(page.limit).min(total);
    let candidates: Vec<Candidate> = candidates
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();

    DiscoveryPage {
        candidates,
        info: PageInfo {
            total,
            offset: page.offset,
            limit: page.limit,
            next_offset: (end < total).then_some(end),
        },
    }
}

#[inline]
fn by_recency(a: &Candidate, b: &Candidate) -> Ordering {
    b.profile.recency().cmp(&a.profile.recency())
}

#[inline]
fn by_distance(a: &Candidate, b: &Candidate) -> Ordering {
    match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("Distance"), Some(SortKey::Distance));
        assert_eq!(SortKey::parse(" newest "), Some(SortKey::Recent));
        assert_eq!(SortKey::parse("likes_you"), Some(SortKey::LikedMe));
        assert_eq!(SortKey::parse("score"), None);
    }

    #[test]
    fn test_page_request_clamps() {
        let config = DiscoveryConfig::default();

        assert_eq!(PageRequest::clamped(None, None, &config).limit, 50);
        assert_eq!(PageRequest::clamped(None, Some(0), &config).limit, 50);
        assert_eq!(PageRequest::clamped(Some(10), Some(5000), &config), PageRequest { offset: 10, limit: 100 });
    }

    #[test]
    fn test_paginate_past_end_is_empty() {
        let page = paginate(Vec::new(), PageRequest { offset: 100, limit: 10 }, 0);
        assert!(page.candidates.is_empty());
        assert_eq!(page.info.total, 0);
        assert_eq!(page.info.next_offset, None);
    }

    #[test]
    fn test_paginate_reports_store_total() {
        let page = paginate(Vec::new(), PageRequest { offset: 0, limit: 10 }, 35);
        assert_eq!(page.info.total, 35);
        assert_eq!(page.info.next_offset, Some(10));

        let last = paginate(Vec::new(), PageRequest { offset: 30, limit: 10 }, 35);
        assert_eq!(last.info.next_offset, None);
    }
}
