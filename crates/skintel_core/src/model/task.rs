use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Evening,
    Anytime,
}

impl TimeOfDay {
    fn rank(self) -> u8 {
        match self {
            Self::Morning => 0,
            Self::Evening => 1,
            Self::Anytime => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Evening => "evening",
            Self::Anytime => "anytime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Cleansing,
    Treatment,
    Moisturizing,
    Protection,
    Lifestyle,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cleansing => "cleansing",
            Self::Treatment => "treatment",
            Self::Moisturizing => "moisturizing",
            Self::Protection => "protection",
            Self::Lifestyle => "lifestyle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    Important,
    Optional,
}

impl Priority {
    /// Adherence weight used by the daily score.
    pub fn weight(self) -> u32 {
        match self {
            Self::Critical => 3,
            Self::Important => 2,
            Self::Optional => 1,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::Important => 1,
            Self::Optional => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Important => "important",
            Self::Optional => "optional",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adaptations {
    #[serde(default)]
    pub skip_count: u32,
    #[serde(default)]
    pub last_skipped: Option<Date>,
    #[serde(default)]
    pub time_adjusted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub generation: u32,
    pub week: u8,
    pub title: String,
    pub description: String,
    pub time_of_day: TimeOfDay,
    pub category: Category,
    pub priority: Priority,
    #[serde(default)]
    pub recommended_products: Vec<String>,
    #[serde(default)]
    pub user_products: Option<Vec<String>>,
    pub is_active: bool,
    #[serde(default)]
    pub adaptations: Adaptations,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Listing order: priority, then time of day, then title and id so the
/// order is total.
pub fn schedule_order(left: &Task, right: &Task) -> Ordering {
    left.priority
        .rank()
        .cmp(&right.priority.rank())
        .then_with(|| left.time_of_day.rank().cmp(&right.time_of_day.rank()))
        .then_with(|| left.title.cmp(&right.title))
        .then_with(|| left.id.cmp(&right.id))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{Adaptations, Category, Priority, Task, TimeOfDay};
    use time::macros::datetime;

    pub fn task(
        id: &str,
        user_id: &str,
        week: u8,
        priority: Priority,
        time_of_day: TimeOfDay,
    ) -> Task {
        Task {
            id: id.to_string(),
            user_id: user_id.to_string(),
            generation: 1,
            week,
            title: format!("{id} title"),
            description: format!("{id} description"),
            time_of_day,
            category: Category::Treatment,
            priority,
            recommended_products: Vec::new(),
            user_products: None,
            is_active: true,
            adaptations: Adaptations::default(),
            created_at: datetime!(2025-01-01 00:00 UTC),
            updated_at: datetime!(2025-01-01 00:00 UTC),
        }
    }
}
