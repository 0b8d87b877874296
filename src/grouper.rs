//! Groups a decoded batch by destination collection.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::event::Event;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("routing key {0:?} has no destination collection segment")]
    MalformedKey(String),
}

/// Destination collection for a routing key: the segment after the last
/// `.`, or the whole key when it contains no separator.
pub fn collection_name(routing_key: &str) -> Result<&str, GroupError> {
    let name = match routing_key.rsplit_once('.') {
        Some((_, last)) => last,
        None => routing_key,
    };
    if name.is_empty() {
        return Err(GroupError::MalformedKey(routing_key.to_owned()));
    }
    Ok(name)
}

/// Records bucketed under one destination collection.
#[derive(Debug)]
pub struct Collection {
    /// Timestamp of the first event routed here, used as the
    /// representative time on the wire.
    pub time: i64,
    pub records: Vec<Value>,
}

/// Destination → records, retaining first-encounter destination order so
/// aggregate mode can name a representative destination.
#[derive(Debug, Default)]
pub struct GroupedBatch {
    order: Vec<String>,
    collections: HashMap<String, Collection>,
}

impl GroupedBatch {
    /// Total records across all destinations.
    pub fn len(&self) -> usize {
        self.collections.values().map(|c| c.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Destinations in first-encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Collection)> {
        self.order
            .iter()
            .map(|tag| (tag.as_str(), &self.collections[tag]))
    }

    pub fn first_tag(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    pub fn first_time(&self) -> Option<i64> {
        self.first_tag().map(|tag| self.collections[tag].time)
    }
}

/// Bucket each event's record under its destination, creating the bucket
/// on first occurrence. Grouping neither loses nor duplicates records.
pub fn group(events: Vec<Event>) -> Result<GroupedBatch, GroupError> {
    let mut grouped = GroupedBatch::default();
    for event in events {
        let tag = collection_name(&event.routing_key)?.to_owned();
        match grouped.collections.get_mut(&tag) {
            Some(collection) => collection.records.push(event.record),
            None => {
                grouped.order.push(tag.clone());
                grouped.collections.insert(
                    tag,
                    Collection {
                        time: event.timestamp,
                        records: vec![event.record],
                    },
                );
            }
        }
    }
    Ok(grouped)
}
