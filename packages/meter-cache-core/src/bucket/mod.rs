//! Day bucket: one owner's readings for one calendar day.
//!
//! Pure data-structure logic. Readings are unique by timestamp; a second
//! reading at an existing timestamp replaces the first in place. The
//! backing array grows by half its logical capacity, starting at
//! [`INITIAL_CAPACITY`] on first growth.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::error::{CacheError, Result};
use crate::record::Record;
use crate::schema::RecordDef;

/// Capacity of the reading array on first growth from empty.
pub const INITIAL_CAPACITY: usize = 16;

/// Milliseconds per day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Milliseconds per hour.
pub const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Converts an epoch day number to a calendar date.
pub fn epoch_day_to_date(day: i64) -> Option<NaiveDate> {
    let ce_day = i32::try_from(day.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?).ok()?;
    NaiveDate::from_num_days_from_ce_opt(ce_day)
}

/// Converts a calendar date to its epoch day number.
pub fn date_to_epoch_day(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE
}

/// Epoch day a millisecond timestamp falls on, in UTC.
pub fn epoch_day_of(timestamp_millis: i64) -> i64 {
    timestamp_millis.div_euclid(MILLIS_PER_DAY)
}

/// Returns `true` when both the age and the idle threshold are exceeded.
///
/// # Arguments
/// * `created_at` - Bucket creation time in ms
/// * `last_access_at` - Last ingest or read in ms
/// * `now` - Current time in ms
/// * `retention_days` - Minimum age in days
/// * `idle_hours` - Minimum idle time in hours
pub fn is_stale(
    created_at: i64,
    last_access_at: i64,
    now: i64,
    retention_days: u32,
    idle_hours: u32,
) -> bool {
    let age = now.saturating_sub(created_at);
    let idle = now.saturating_sub(last_access_at);
    age > i64::from(retention_days) * MILLIS_PER_DAY
        && idle > i64::from(idle_hours) * MILLIS_PER_HOUR
}

/// One owner's readings for one calendar day.
#[derive(Debug, Clone)]
pub struct Bucket {
    owner_id: String,
    day: i64,
    kind: String,
    reading_def: Arc<RecordDef>,
    readings: Vec<Record>,
    capacity: usize,
    initial_capacity: usize,
    created_at: i64,
    last_access_at: i64,
}

impl Bucket {
    /// Creates an empty bucket.
    ///
    /// # Arguments
    /// * `owner_id` - Device that produced the readings
    /// * `day` - Days since the Unix epoch
    /// * `kind` - Bucket record kind name
    /// * `reading_def` - Reading kind the bucket holds
    /// * `now` - Creation time in ms
    pub fn new(
        owner_id: impl Into<String>,
        day: i64,
        kind: impl Into<String>,
        reading_def: Arc<RecordDef>,
        now: i64,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            day,
            kind: kind.into(),
            reading_def,
            readings: Vec::new(),
            capacity: 0,
            initial_capacity: INITIAL_CAPACITY,
            created_at: now,
            last_access_at: now,
        }
    }

    /// Overrides the capacity used on first growth.
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity.max(1);
        self
    }

    /// Reassembles a decoded bucket, checking its invariants.
    pub(crate) fn from_parts(
        owner_id: String,
        day: i64,
        kind: String,
        reading_def: Arc<RecordDef>,
        readings: Vec<Record>,
        created_at: i64,
        last_access_at: i64,
    ) -> Result<Self> {
        if created_at > last_access_at {
            return Err(CacheError::codec(format!(
                "bucket {}:{} last access {} precedes creation {}",
                owner_id, day, last_access_at, created_at
            )));
        }
        let mut seen = HashSet::with_capacity(readings.len());
        if let Some(dup) = readings.iter().find(|r| !seen.insert(r.timestamp())) {
            return Err(CacheError::codec(format!(
                "bucket {}:{} holds duplicate timestamp {}",
                owner_id,
                day,
                dup.timestamp()
            )));
        }
        if let Some(stray) = readings.iter().find(|r| epoch_day_of(r.timestamp()) != day) {
            return Err(CacheError::codec(format!(
                "bucket {}:{} holds reading {} from day {}",
                owner_id,
                day,
                stray.timestamp(),
                epoch_day_of(stray.timestamp())
            )));
        }

        let capacity = readings.len();
        Ok(Self {
            owner_id,
            day,
            kind,
            reading_def,
            readings,
            capacity,
            initial_capacity: INITIAL_CAPACITY,
            created_at,
            last_access_at,
        })
    }

    /// Adds a reading, replacing any reading with the same timestamp.
    ///
    /// # Arguments
    /// * `reading` - Reading of this bucket's reading kind
    /// * `now` - Ingest time in ms, recorded as the last access
    ///
    /// # Returns
    /// `Result<(), CacheError>` with `InvalidArgument` for a reading of
    /// another kind or of another day.
    pub fn add_reading(&mut self, reading: Record, now: i64) -> Result<()> {
        if reading.kind() != self.reading_def.name() {
            return Err(CacheError::InvalidArgument(format!(
                "{} reading cannot be stored in a bucket of {}",
                reading.kind(),
                self.reading_def.name()
            )));
        }

        let ts = reading.timestamp();
        if epoch_day_of(ts) != self.day {
            return Err(CacheError::InvalidArgument(format!(
                "reading {} does not fall on day {} of bucket {}",
                ts, self.day, self.owner_id
            )));
        }
        match self.readings.iter().position(|r| r.timestamp() == ts) {
            Some(pos) => self.readings[pos] = reading,
            None => {
                self.ensure_capacity(self.readings.len() + 1);
                self.readings.push(reading);
            }
        }
        self.touch(now);
        Ok(())
    }

    /// Grows the backing array to hold at least `min` readings.
    ///
    /// New capacity is `max(min, old * 1.5)`, or `max(min, initial)` when
    /// nothing has been allocated yet.
    pub fn ensure_capacity(&mut self, min: usize) {
        if self.capacity >= min {
            return;
        }
        let grown = if self.capacity == 0 {
            self.initial_capacity
        } else {
            self.capacity + self.capacity / 2
        };
        let target = grown.max(min);
        self.readings
            .reserve_exact(target.saturating_sub(self.readings.len()));
        self.capacity = target;
    }

    /// Shrinks the backing array to exactly the reading count.
    pub fn trim_to_fit(&mut self) {
        self.readings.shrink_to_fit();
        self.capacity = self.readings.len();
    }

    /// Readings with `start <= timestamp <= end`, sorted by timestamp.
    pub fn query_range(&self, start: i64, end: i64) -> Vec<Record> {
        let mut hits: Vec<Record> = self
            .readings
            .iter()
            .filter(|r| (start..=end).contains(&r.timestamp()))
            .cloned()
            .collect();
        hits.sort_by_key(Record::timestamp);
        hits
    }

    /// Refreshes the last-access time. Never moves it backwards.
    pub fn touch(&mut self, now: i64) {
        self.last_access_at = self.last_access_at.max(now);
    }

    /// Returns `true` when the bucket is both old and idle at `now`.
    pub fn is_evictable(&self, now: i64, retention_days: u32, idle_hours: u32) -> bool {
        is_stale(
            self.created_at,
            self.last_access_at,
            now,
            retention_days,
            idle_hours,
        )
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Days since the Unix epoch.
    pub fn day(&self) -> i64 {
        self.day
    }

    /// Calendar date of the bucket's day.
    pub fn date(&self) -> Option<NaiveDate> {
        epoch_day_to_date(self.day)
    }

    /// Bucket record kind name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn reading_def(&self) -> &Arc<RecordDef> {
        &self.reading_def
    }

    /// Readings in insertion order.
    pub fn readings(&self) -> &[Record] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Logical capacity of the reading array.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn last_access_at(&self) -> i64 {
        self.last_access_at
    }

    /// JSON view of the bucket, readings in timestamp order.
    pub fn to_json(&self) -> serde_json::Value {
        let mut readings: Vec<&Record> = self.readings.iter().collect();
        readings.sort_by_key(|r| r.timestamp());
        serde_json::json!({
            "ownerId": self.owner_id,
            "day": self.day,
            "date": self.date().map(|d| d.to_string()),
            "kind": self.kind,
            "count": self.readings.len(),
            "createdAt": self.created_at,
            "lastAccessAt": self.last_access_at,
            "readings": readings.iter().map(|r| r.to_json()).collect::<Vec<_>>(),
        })
    }
}
