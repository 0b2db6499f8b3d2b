use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::filter::TagFilter;
use crate::tagop::TagOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagProtocol {
    Gen2,
    Iso18k6b,
}

/// One antenna group read with one protocol, optionally filtered, with at
/// most one embedded tag operation.
#[derive(Debug, Clone)]
pub struct SimpleReadPlan {
    /// Antenna ids to use. Empty means all antennas.
    pub antennas: Vec<u16>,
    pub protocol: TagProtocol,
    pub filter: Option<TagFilter>,
    pub op: Option<TagOp>,
    /// Relative share of a multi plan's duration. Zero means even split.
    pub weight: u32,
    pub fast_search: bool,
}

impl SimpleReadPlan {
    pub fn new(protocol: TagProtocol) -> SimpleReadPlan {
        SimpleReadPlan {
            antennas: Vec::new(),
            protocol,
            filter: None,
            op: None,
            weight: 0,
            fast_search: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultiReadPlan {
    pub plans: Vec<ReadPlan>,
}

#[derive(Debug, Clone)]
pub enum ReadPlan {
    Simple(SimpleReadPlan),
    Multi(MultiReadPlan),
}

impl Default for ReadPlan {
    fn default() -> Self {
        ReadPlan::Simple(SimpleReadPlan::new(TagProtocol::Gen2))
    }
}

impl ReadPlan {
    /// Sum of weights across immediate leaves, used for the duration split.
    fn total_weight(&self) -> u64 {
        match self {
            ReadPlan::Simple(plan) => u64::from(plan.weight),
            ReadPlan::Multi(multi) => multi.plans.iter().map(|p| p.total_weight()).sum(),
        }
    }

    fn leaf_count(&self) -> usize {
        match self {
            ReadPlan::Simple(_) => 1,
            ReadPlan::Multi(multi) => multi.plans.iter().map(|p| p.leaf_count()).sum(),
        }
    }

    /// Flatten into leaf plans, each with its share of `duration_ms`:
    /// proportional to weight, or an even split when every weight is zero.
    pub fn leaves(&self, duration_ms: u32) -> Vec<(&SimpleReadPlan, u32)> {
        let mut out = Vec::with_capacity(self.leaf_count());
        let total = self.total_weight();
        if total == 0 {
            let count = self.leaf_count() as u32;
            let each = if count == 0 { 0 } else { duration_ms / count };
            self.collect_even(each, &mut out);
        } else {
            self.collect_weighted(duration_ms, total, &mut out);
        }
        out
    }

    fn collect_even<'a>(&'a self, each: u32, out: &mut Vec<(&'a SimpleReadPlan, u32)>) {
        match self {
            ReadPlan::Simple(plan) => out.push((plan, each)),
            ReadPlan::Multi(multi) => {
                for plan in &multi.plans {
                    plan.collect_even(each, out);
                }
            }
        }
    }

    fn collect_weighted<'a>(
        &'a self,
        duration_ms: u32,
        total: u64,
        out: &mut Vec<(&'a SimpleReadPlan, u32)>,
    ) {
        match self {
            ReadPlan::Simple(plan) => {
                let share = u64::from(duration_ms) * u64::from(plan.weight) / total;
                out.push((plan, share.min(u64::from(u32::MAX)) as u32));
            }
            ReadPlan::Multi(multi) => {
                for plan in &multi.plans {
                    plan.collect_weighted(duration_ms, total, out);
                }
            }
        }
    }

    /// Antenna ids, when present, must fall within the reader's port range.
    pub fn validate(&self, max_antennas: u16) -> Result<(), ReaderError> {
        match self {
            ReadPlan::Simple(plan) => {
                for ant in &plan.antennas {
                    if *ant < 1 || *ant > max_antennas {
                        return Err(ReaderError::InvalidArgument(format!(
                            "antenna {ant} outside of range [1, {max_antennas}]"
                        )))
                    }
                }
                if let Some(filter) = &plan.filter {
                    filter.validate()?;
                }
                Ok(())
            }
            ReadPlan::Multi(multi) => {
                for plan in &multi.plans {
                    plan.validate(max_antennas)?;
                }
                Ok(())
            }
        }
    }
}
