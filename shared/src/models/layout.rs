//! Table-range group layout
//!
//! Groups are ordered inclusive ranges of table numbers. The group id of a
//! range is its position in the layout.

use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::GroupId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRange {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLayout {
    ranges: Vec<TableRange>,
}

impl GroupLayout {
    pub fn new(ranges: Vec<TableRange>) -> SharedResult<Self> {
        let mut previous_end: Option<i64> = None;
        for range in &ranges {
            if range.start > range.end {
                return Err(SharedError::invalid_config(
                    "groups",
                    format!("{}-{}", range.start, range.end),
                ));
            }
            if let Some(end) = previous_end {
                if range.start <= end {
                    return Err(SharedError::invalid_config(
                        "groups",
                        format!("overlapping range starting at {}", range.start),
                    ));
                }
            }
            previous_end = Some(range.end);
        }
        Ok(Self { ranges })
    }

    /// Split tables `1..=tables` into `groups` contiguous ranges of near equal size
    pub fn even(tables: i64, groups: i64) -> SharedResult<Self> {
        if groups <= 0 || tables < groups {
            return Err(SharedError::invalid_config("groups", groups));
        }
        let base = tables / groups;
        let extra = tables % groups;
        let mut start = 1;
        let mut ranges = Vec::with_capacity(groups as usize);
        for i in 0..groups {
            let size = base + if i < extra { 1 } else { 0 };
            ranges.push(TableRange {
                start,
                end: start + size - 1,
            });
            start += size;
        }
        Self::new(ranges)
    }

    /// Parse a layout such as `"1-10,11-20,21-35"`
    pub fn parse(raw: &str) -> SharedResult<Self> {
        let mut ranges = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (start, end) = part
                .split_once('-')
                .ok_or_else(|| SharedError::invalid_config("groups", part))?;
            let start = start
                .trim()
                .parse::<i64>()
                .map_err(|_| SharedError::invalid_config("groups", part))?;
            let end = end
                .trim()
                .parse::<i64>()
                .map_err(|_| SharedError::invalid_config("groups", part))?;
            ranges.push(TableRange { start, end });
        }
        Self::new(ranges)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[TableRange] {
        &self.ranges
    }

    /// Group for a table number; tables past the last range fall in the last group
    pub fn group_for(&self, location: i64) -> GroupId {
        if self.ranges.is_empty() {
            return GroupId(0);
        }
        self.ranges
            .iter()
            .position(|r| location >= r.start && location <= r.end)
            .or_else(|| {
                self.ranges
                    .iter()
                    .position(|r| location < r.start)
                    .map(|i| i.saturating_sub(1))
            })
            .map(|i| GroupId(i as i64))
            .unwrap_or(GroupId(self.ranges.len() as i64 - 1))
    }
}
