/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

// Column positions read by the comparison tables, see `Category::columns`.
pub const DELAY_AVG: usize = 1;
pub const SUCCESS_RATE: usize = 3;
pub const TOTAL_CPU_RATE: usize = 2;
pub const TOTAL_RAM_RATE: usize = 5;
pub const TOTAL_BW_RATE: usize = 2;
pub const DC_CPU_RATE: usize = 3;
pub const DC_RAM_RATE: usize = 6;
pub const LINK_BW_RATE: usize = 4;

/// The eight kinds of result a record store yields for one algorithm run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    DecisionDelay,
    SuccessRate,
    Destination,
    TotalUsedResource,
    TotalUsedBwResource,
    UsedResource,
    UsedBwResource,
    Tco,
}

impl Category {
    /// Categories produced by querying the record store. TCO comes from the run log instead.
    pub const QUERIED: [Category; 7] = [
        Category::DecisionDelay,
        Category::SuccessRate,
        Category::Destination,
        Category::TotalUsedResource,
        Category::TotalUsedBwResource,
        Category::UsedResource,
        Category::UsedBwResource,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::DecisionDelay => "decision_delay",
            Category::SuccessRate => "success_rate",
            Category::Destination => "destination",
            Category::TotalUsedResource => "total_used_resource",
            Category::TotalUsedBwResource => "total_used_bw_resource",
            Category::UsedResource => "used_resource",
            Category::UsedBwResource => "used_bw_resource",
            Category::Tco => "TCO",
        }
    }

    /// Suffix of the per-run export file, e.g. `decision_delay_data` or `TCO`.
    pub fn file_stem(&self) -> String {
        match self {
            Category::Tco => "TCO".to_string(),
            other => format!("{}_data", other.name()),
        }
    }

    /// Column names of one row, in the order the record store returns them.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Category::DecisionDelay => &[
                "submitTime",
                "avgInterScheduleTime",
                "maxInterScheduleTime",
                "minInterScheduleTime",
            ],
            Category::SuccessRate => &["submitTime", "successNum", "sumNum", "successRate"],
            Category::Destination => &["submitTime", "receivedDc", "countDc", "percentage"],
            Category::TotalUsedResource => &[
                "usedCPU", "sumCPU", "CPURate", "usedRAM", "sumRAM", "RAMRate",
            ],
            Category::TotalUsedBwResource => &["usedBW", "restBW", "BWRate"],
            Category::UsedResource => &[
                "dcId", "usedCPU", "sumCPU", "CPURate", "usedRAM", "sumRAM", "RAMRate",
            ],
            Category::UsedBwResource => &["srcDcId", "dstDcId", "usedBW", "restBW", "BWRate"],
            Category::Tco => &["TCO"],
        }
    }

    pub fn width(&self) -> usize {
        self.columns().len()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn file_stems_match_export_names() {
        assert_eq!(Category::DecisionDelay.file_stem(), "decision_delay_data");
        assert_eq!(
            Category::TotalUsedBwResource.file_stem(),
            "total_used_bw_resource_data"
        );
        assert_eq!(Category::Tco.file_stem(), "TCO");
    }

    #[test]
    fn queried_categories_exclude_tco() {
        assert!(!Category::QUERIED.contains(&Category::Tco));
        assert_eq!(Category::QUERIED.iter().unique().count(), 7);
    }

    #[test]
    fn destination_schema_has_percentage_last() {
        assert_eq!(Category::Destination.width(), 4);
        assert_eq!(Category::Destination.columns()[3], "percentage");
    }

    #[test]
    fn table_columns_point_at_their_names() {
        let cases = [
            (Category::DecisionDelay, DELAY_AVG, "avgInterScheduleTime"),
            (Category::SuccessRate, SUCCESS_RATE, "successRate"),
            (Category::TotalUsedResource, TOTAL_CPU_RATE, "CPURate"),
            (Category::TotalUsedResource, TOTAL_RAM_RATE, "RAMRate"),
            (Category::TotalUsedBwResource, TOTAL_BW_RATE, "BWRate"),
            (Category::UsedResource, DC_CPU_RATE, "CPURate"),
            (Category::UsedResource, DC_RAM_RATE, "RAMRate"),
            (Category::UsedBwResource, LINK_BW_RATE, "BWRate"),
        ];

        for (category, index, name) in cases {
            assert_eq!(category.columns().get(index), Some(&name), "{}", category);
        }
    }
}
