//! Product reviews

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub count: usize,
    pub average_rating: Option<f64>,
}

impl ReviewSummary {
    pub fn of(reviews: &[Review]) -> Self {
        let count = reviews.len();
        let average_rating = (count > 0).then(|| {
            let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
            (f64::from(sum) / count as f64 * 10.0).round() / 10.0
        });
        Self { count, average_rating }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: u8) -> Review {
        Review {
            id: Uuid::new_v4(),
            product_id: Uuid::nil(),
            author_id: Uuid::new_v4(),
            author_name: "Esi".into(),
            rating,
            comment: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_average() {
        assert_eq!(ReviewSummary::of(&[]), ReviewSummary { count: 0, average_rating: None });
        let summary = ReviewSummary::of(&[review(5), review(4), review(4)]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average_rating, Some(4.3));
    }
}
