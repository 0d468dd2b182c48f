//! Bucketer (C3): split a resolved plan into the serial and parallel
//! buckets based on each driver's `parallel` flag, preserving driver
//! insertion order within each bucket.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::registry::{DriverId, Registry};
use crate::types::ImageType;

pub type DriverImages = BTreeMap<ImageType, PathBuf>;

/// The bucketed form consumed by the executor (§3 "ResolvedPlan").
#[derive(Debug, Default)]
pub struct ResolvedPlan {
    pub serial_bucket: Vec<(DriverId, DriverImages)>,
    pub parallel_bucket: Vec<(DriverId, DriverImages)>,
}

/// Partition `grouped` (insertion-ordered `{driver -> images}`) by each
/// driver's `parallel` flag.
pub fn bucket(
    registry: &Registry,
    grouped: Vec<(DriverId, DriverImages)>,
) -> ResolvedPlan {
    let mut plan = ResolvedPlan::default();
    for (id, images) in grouped {
        if registry.driver(id).is_parallel() {
            plan.parallel_bucket.push((id, images));
        } else {
            plan.serial_bucket.push((id, images));
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlashConfig;
    use crate::testutil::{fake_one_shot, FakeSupervisedBuilder};
    use std::time::Duration;

    #[tokio::test]
    async fn partitions_by_parallel_flag() {
        let (serial_driver, _) = fake_one_shot(Duration::from_secs(1));
        let (parallel_driver, _) = FakeSupervisedBuilder::new().parallel(true).build();

        let registry = Registry::builder(FlashConfig::new("/tmp/state"))
            .driver("s", serial_driver)
            .driver("p", parallel_driver)
            .build(None)
            .await
            .unwrap();

        let grouped = vec![
            (DriverId(0), DriverImages::new()),
            (DriverId(1), DriverImages::new()),
        ];
        let plan = bucket(&registry, grouped);
        assert_eq!(plan.serial_bucket.len(), 1);
        assert_eq!(plan.parallel_bucket.len(), 1);
        assert_eq!(plan.serial_bucket[0].0, DriverId(0));
        assert_eq!(plan.parallel_bucket[0].0, DriverId(1));
    }
}
