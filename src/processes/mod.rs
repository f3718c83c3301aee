//! The catalogue of QA processes this binary can run.

pub mod api_testing;
pub mod exploratory_testing;
pub mod metrics_dashboard;
pub mod mobile_testing;
pub mod quality_gates;
pub mod test_data_management;
pub mod visual_regression;

use crate::error::{AppError, Result};
use crate::workflow::Process;

pub fn all() -> Vec<Box<dyn Process>> {
    vec![
        Box::new(mobile_testing::MobileTesting),
        Box::new(metrics_dashboard::MetricsDashboard),
        Box::new(exploratory_testing::ExploratoryTesting),
        Box::new(test_data_management::TestDataManagement),
        Box::new(visual_regression::VisualRegression),
        Box::new(api_testing::ApiTesting),
        Box::new(quality_gates::QualityGates),
    ]
}

/// Look up a process by id.
pub fn find(id: &str) -> Result<Box<dyn Process>> {
    all()
        .into_iter()
        .find(|p| p.id() == id)
        .ok_or_else(|| AppError::UnknownProcess(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = all().iter().map(|p| p.id()).collect();
        assert_eq!(ids.len(), all().len());
    }

    #[test]
    fn test_find() {
        assert_eq!(find("api-testing").unwrap().id(), "api-testing");
        assert!(matches!(
            find("load-testing"),
            Err(AppError::UnknownProcess(id)) if id == "load-testing"
        ));
    }
}
