//! Proximity grouping: clusters records that share one map marker.
//!
//! Records with the same restaurant name whose coordinate lies within
//! `MERGE_RADIUS_M` of a group's representative coordinate join that group.
//! Records without a restaurant never merge. Groups are rebuilt from scratch
//! on every change; nothing here is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::memories::geo::Coordinate;
use crate::models::memory::MemoryRecord;

/// Maximum distance between a record and a group's representative coordinate.
pub const MERGE_RADIUS_M: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DishGroup {
    pub key: String,
    pub restaurant_name: Option<String>,
    /// Coordinate of the first record added; never moves.
    pub latitude: f64,
    pub longitude: f64,
    pub members: Vec<MemoryRecord>,
}

impl DishGroup {
    fn singleton(record: &MemoryRecord) -> Self {
        Self {
            key: format!("memory-{}", record.id),
            restaurant_name: None,
            latitude: record.latitude,
            longitude: record.longitude,
            members: vec![record.clone()],
        }
    }

    fn for_restaurant(name: &str, record: &MemoryRecord) -> Self {
        Self {
            key: format!("{}|{}|{}", name, record.latitude, record.longitude),
            restaurant_name: Some(name.to_string()),
            latitude: record.latitude,
            longitude: record.longitude,
            members: vec![record.clone()],
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Most recent capture (or upload) time across members.
    pub fn latest_experienced_at(&self) -> Option<DateTime<Utc>> {
        self.members.iter().map(MemoryRecord::experienced_at).max()
    }

    fn accepts(&self, name: &str, at: &Coordinate) -> bool {
        self.restaurant_name.as_deref() == Some(name)
            && self.coordinate().distance_m(at) <= MERGE_RADIUS_M
    }
}

/// Both orderings the UI needs.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedMemories {
    /// Marker placement order: order of first appearance in the input.
    pub markers: Vec<DishGroup>,
    /// List order: most recently experienced group first.
    pub list: Vec<DishGroup>,
}

/// Groups records (expected most-recent-first) in input order.
pub fn group_memories(records: &[MemoryRecord]) -> Vec<DishGroup> {
    let mut groups: Vec<DishGroup> = Vec::new();

    for record in records {
        let Some(name) = record.restaurant_name.as_deref() else {
            groups.push(DishGroup::singleton(record));
            continue;
        };

        let at = record.coordinate();
        match groups.iter_mut().find(|g| g.accepts(name, &at)) {
            Some(group) => group.members.push(record.clone()),
            None => groups.push(DishGroup::for_restaurant(name, record)),
        }
    }

    groups
}

/// Re-orders groups for the list view. Stable for equal timestamps.
pub fn list_order(groups: &[DishGroup]) -> Vec<DishGroup> {
    let mut sorted = groups.to_vec();
    sorted.sort_by(|a, b| b.latest_experienced_at().cmp(&a.latest_experienced_at()));
    sorted
}

pub fn group_for_display(records: &[MemoryRecord]) -> GroupedMemories {
    let markers = group_memories(records);
    let list = list_order(&markers);
    GroupedMemories { markers, list }
}
