//! Product review types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{ProductId, Rating, ReviewId, UserId};

/// Maximum review title length in characters.
pub const MAX_TITLE_CHARS: usize = 120;
/// Maximum review body length in characters.
pub const MAX_BODY_CHARS: usize = 4000;

/// A published review.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub reviewer_name: String,
    pub rating: Rating,
    pub title: String,
    pub body: String,
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate ratings for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingSummary {
    /// Mean rating to one decimal place, `None` without reviews.
    pub average: Option<Decimal>,
    pub count: i64,
    /// Review counts for 1 through 5 stars.
    pub histogram: [i64; 5],
}

impl RatingSummary {
    /// Build from `(stars, count)` pairs as returned by a `GROUP BY rating`.
    ///
    /// Out-of-range star values are ignored.
    #[must_use]
    pub fn from_counts(counts: &[(i16, i64)]) -> Self {
        let mut histogram = [0_i64; 5];
        for &(stars, count) in counts {
            if let Some(slot) = usize::try_from(stars)
                .ok()
                .and_then(|s| s.checked_sub(1))
                .and_then(|i| histogram.get_mut(i))
            {
                *slot += count;
            }
        }

        let count: i64 = histogram.iter().sum();
        let weighted: i64 = histogram
            .iter()
            .zip(1_i64..)
            .map(|(n, stars)| n * stars)
            .sum();

        let average = (count > 0)
            .then(|| (Decimal::from(weighted) / Decimal::from(count)).round_dp(1));

        Self {
            average,
            count,
            histogram,
        }
    }
}

/// Product reviews response.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPage {
    pub summary: RatingSummary,
    pub reviews: super::Paginated<Review>,
    /// The caller's own review, when signed in and one exists.
    pub mine: Option<Review>,
}

/// `PUT /api/products/{slug}/reviews/mine` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: Rating,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl ReviewInput {
    /// Trim text fields and enforce length limits.
    ///
    /// # Errors
    ///
    /// Returns a message naming the field that is too long.
    pub fn normalize(self) -> Result<Self, String> {
        let title = self.title.trim().to_owned();
        let body = self.body.trim().to_owned();

        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(format!("title must be at most {MAX_TITLE_CHARS} characters"));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(format!("body must be at most {MAX_BODY_CHARS} characters"));
        }

        Ok(Self {
            rating: self.rating,
            title,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_summary_empty() {
        let summary = RatingSummary::from_counts(&[]);
        assert_eq!(summary.average, None);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.histogram, [0; 5]);
    }

    #[test]
    fn test_summary_average_rounds_to_one_place() {
        // 5,5,4 -> 4.666...
        let summary = RatingSummary::from_counts(&[(5, 2), (4, 1)]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, Some(Decimal::from_str("4.7").unwrap()));
        assert_eq!(summary.histogram, [0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_summary_ignores_out_of_range_stars() {
        let summary = RatingSummary::from_counts(&[(0, 3), (6, 1), (2, 1)]);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, Some(Decimal::from(2)));
    }

    #[test]
    fn test_review_input_trims() {
        let input: ReviewInput =
            serde_json::from_str(r#"{"rating": 4, "title": "  Lovely fabric ", "body": "Fits well"}"#)
                .unwrap();
        let input = input.normalize().unwrap();
        assert_eq!(input.title, "Lovely fabric");
        assert_eq!(input.rating.get(), 4);
    }

    #[test]
    fn test_review_input_limits() {
        let input = ReviewInput {
            rating: Rating::new(5).unwrap(),
            title: "x".repeat(MAX_TITLE_CHARS + 1),
            body: String::new(),
        };
        assert!(input.normalize().is_err());

        let input = ReviewInput {
            rating: Rating::new(5).unwrap(),
            title: String::new(),
            body: "x".repeat(MAX_BODY_CHARS + 1),
        };
        assert!(input.normalize().is_err());
    }

    #[test]
    fn test_review_input_rejects_bad_rating() {
        assert!(serde_json::from_str::<ReviewInput>(r#"{"rating": 6}"#).is_err());
    }
}
