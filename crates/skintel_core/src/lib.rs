pub mod adaptation;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod planner;
pub mod scoring;
pub mod storage;

pub use engine::TaskEngine;
pub use error::{EngineError, EngineResult};

#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use crate::model::{Priority, TimeOfDay};

    #[test]
    fn priority_weights_follow_importance() {
        assert_eq!(Priority::Critical.weight(), 3);
        assert_eq!(Priority::Important.weight(), 2);
        assert_eq!(Priority::Optional.weight(), 1);
        assert_eq!(TimeOfDay::Morning.as_str(), "morning");
    }

    #[test]
    fn engine_error_exposes_code() {
        let err = EngineError::invalid_input("missing user id");
        assert_eq!(err.code(), "invalid_input");
        assert_eq!(err.message(), "missing user id");
    }
}
