//! Post validation rules applied while gathering.

use chrono::{DateTime, Utc};

use crate::config::FilterConfig;
use crate::media::Post;

/// What to do with a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep checking; accept the post if every rule agrees.
    Continue,
    /// Leave this post out.
    Ignore,
    /// Leave this post out and stop gathering.
    Stop,
}

/// A predicate over posts. Rules run in ascending priority order and the
/// first verdict other than `Continue` wins.
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    fn check(&self, post: &dyn Post) -> Verdict;
}

/// Rejects posts created before a cutoff.
///
/// On a newest-first listing everything after the first old post is older
/// still, so the rule stops gathering there.
#[derive(Debug, Clone)]
pub struct MaxAge {
    cutoff: DateTime<Utc>,
    stop_on_old: bool,
}

impl MaxAge {
    pub fn new(cutoff: DateTime<Utc>, time_sorted: bool) -> Self {
        Self {
            cutoff,
            stop_on_old: time_sorted,
        }
    }
}

impl ValidationRule for MaxAge {
    fn name(&self) -> &str {
        "max-age"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn check(&self, post: &dyn Post) -> Verdict {
        if post.created_at() >= self.cutoff {
            Verdict::Continue
        } else if self.stop_on_old {
            Verdict::Stop
        } else {
            Verdict::Ignore
        }
    }
}

#[derive(Debug, Clone)]
pub struct MinScore(pub i64);

impl ValidationRule for MinScore {
    fn name(&self) -> &str {
        "min-score"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn check(&self, post: &dyn Post) -> Verdict {
        if post.score() >= self.0 {
            Verdict::Continue
        } else {
            Verdict::Ignore
        }
    }
}

/// Rejects posts whose listing reports a size below the minimum.
#[derive(Debug, Clone)]
pub struct MinDimensions {
    pub width: u32,
    pub height: u32,
}

impl ValidationRule for MinDimensions {
    fn name(&self) -> &str {
        "min-dimensions"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn check(&self, post: &dyn Post) -> Verdict {
        match post.dimensions() {
            Some((w, h)) if w < self.width || h < self.height => Verdict::Ignore,
            _ => Verdict::Continue,
        }
    }
}

/// Rejects posts whose reported width / height ratio falls outside a range.
#[derive(Debug, Clone)]
pub struct AspectRange {
    pub min: f64,
    pub max: f64,
}

impl ValidationRule for AspectRange {
    fn name(&self) -> &str {
        "aspect-range"
    }

    fn priority(&self) -> i32 {
        21
    }

    fn check(&self, post: &dyn Post) -> Verdict {
        match post.dimensions() {
            Some((w, h)) if !aspect_within(w, h, self.min, self.max) => Verdict::Ignore,
            _ => Verdict::Continue,
        }
    }
}

/// Whether `width / height` lies in `[min, max]`. A zero height never does.
pub fn aspect_within(width: u32, height: u32, min: f64, max: f64) -> bool {
    if height == 0 {
        return false;
    }
    let aspect = f64::from(width) / f64::from(height);
    aspect >= min && aspect <= max
}

/// The score and size rules a filter configuration asks for.
///
/// The age limit is not included: it depends on the source and is set on
/// the session with `with_cutoff`.
pub fn rules_from_filters(filters: &FilterConfig) -> Vec<Box<dyn ValidationRule>> {
    let mut rules: Vec<Box<dyn ValidationRule>> = Vec::new();

    if let Some(min) = filters.min_score {
        rules.push(Box::new(MinScore(min)));
    }
    if filters.min_width > 0 || filters.min_height > 0 {
        rules.push(Box::new(MinDimensions {
            width: filters.min_width,
            height: filters.min_height,
        }));
    }
    if filters.min_aspect > 0.0 || filters.max_aspect < f64::MAX {
        rules.push(Box::new(AspectRange {
            min: filters.min_aspect,
            max: filters.max_aspect,
        }));
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakePost;

    #[test]
    fn test_max_age_stops_on_sorted_sources() {
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        let fresh = FakePost::new("a", 0, 1);
        let old = FakePost::new("b", 0, 48);

        let sorted = MaxAge::new(cutoff, true);
        assert_eq!(sorted.check(&fresh), Verdict::Continue);
        assert_eq!(sorted.check(&old), Verdict::Stop);

        let unsorted = MaxAge::new(cutoff, false);
        assert_eq!(unsorted.check(&old), Verdict::Ignore);
    }

    #[test]
    fn test_min_score() {
        let rule = MinScore(10);
        assert_eq!(rule.check(&FakePost::new("a", 10, 1)), Verdict::Continue);
        assert_eq!(rule.check(&FakePost::new("b", 9, 1)), Verdict::Ignore);
    }

    #[test]
    fn test_size_rules_only_judge_known_sizes() {
        let min = MinDimensions {
            width: 100,
            height: 100,
        };
        assert_eq!(min.check(&FakePost::new("a", 0, 1)), Verdict::Continue);
        assert_eq!(
            min.check(&FakePost::new("b", 0, 1).with_dimensions(50, 200)),
            Verdict::Ignore
        );
        assert_eq!(
            min.check(&FakePost::new("c", 0, 1).with_dimensions(100, 100)),
            Verdict::Continue
        );

        let aspect = AspectRange { min: 1.0, max: 2.0 };
        assert_eq!(
            aspect.check(&FakePost::new("d", 0, 1).with_dimensions(300, 100)),
            Verdict::Ignore
        );
        assert_eq!(
            aspect.check(&FakePost::new("e", 0, 1).with_dimensions(200, 100)),
            Verdict::Continue
        );
    }

    #[test]
    fn test_aspect_within_zero_height() {
        assert!(!aspect_within(10, 0, 0.0, f64::MAX));
    }

    #[test]
    fn test_rules_from_default_filters_is_empty() {
        assert!(rules_from_filters(&FilterConfig::default()).is_empty());

        let filters = FilterConfig {
            min_score: Some(5),
            min_width: 640,
            ..FilterConfig::default()
        };
        let names: Vec<_> = rules_from_filters(&filters)
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["min-score", "min-dimensions"]);
    }
}
