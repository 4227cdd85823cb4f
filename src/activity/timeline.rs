use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Segments shorter than this are treated as noise and dropped when closed.
pub const MIN_SEGMENT_LENGTH_MS: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    Trash,
    BossEncounter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSegment {
    pub kind: SegmentKind,
    pub log_start: DateTime<Utc>,
    pub log_end: Option<DateTime<Utc>>,
    /// Seconds from the run start to this segment's start.
    pub timestamp: f64,
    pub encounter_id: Option<u32>,
    pub result: Option<bool>,
}

impl TimelineSegment {
    pub fn trash(log_start: DateTime<Utc>, run_start: DateTime<Utc>) -> Self {
        Self::new(SegmentKind::Trash, log_start, run_start, None)
    }

    pub fn boss_encounter(
        log_start: DateTime<Utc>,
        run_start: DateTime<Utc>,
        encounter_id: u32,
    ) -> Self {
        Self::new(
            SegmentKind::BossEncounter,
            log_start,
            run_start,
            Some(encounter_id),
        )
    }

    fn new(
        kind: SegmentKind,
        log_start: DateTime<Utc>,
        run_start: DateTime<Utc>,
        encounter_id: Option<u32>,
    ) -> Self {
        let offset_ms = (log_start - run_start).num_milliseconds().max(0);
        Self {
            kind,
            log_start,
            log_end: None,
            timestamp: offset_ms as f64 / 1000.0,
            encounter_id,
            result: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.log_end.is_none()
    }

    pub fn length_ms(&self) -> Option<i64> {
        self.log_end
            .map(|log_end| (log_end - self.log_start).num_milliseconds())
    }
}

/// Ordered trash and boss segments of one keystone run. The last segment is the only one
/// that may be open.
#[derive(Debug, Clone, Default)]
pub struct ChallengeModeTimeline {
    segments: Vec<TimelineSegment>,
}

impl ChallengeModeTimeline {
    /// Closes the open segment at the new segment's start, then appends it.
    pub fn push(&mut self, segment: TimelineSegment) {
        self.close_current(segment.log_start);
        self.segments.push(segment);
    }

    /// Closes the open segment, if any. Returns `false` when the segment was too short and
    /// got discarded.
    pub fn close_current(&mut self, log_end: DateTime<Utc>) -> bool {
        let Some(segment) = self.segments.last_mut().filter(|segment| segment.is_open()) else {
            return true;
        };

        segment.log_end = Some(log_end.max(segment.log_start));
        let length_ms = segment.length_ms().unwrap_or(0);

        if length_ms < MIN_SEGMENT_LENGTH_MS {
            tracing::debug!(
                kind = ?segment.kind,
                length_ms,
                "Discarding short challenge mode segment"
            );
            self.segments.pop();
            return false;
        }

        true
    }

    /// Records the outcome of the open boss segment and closes it.
    pub fn close_boss_encounter(&mut self, log_end: DateTime<Utc>, result: bool) -> bool {
        if let Some(segment) = self.current_mut() {
            if segment.kind == SegmentKind::BossEncounter {
                segment.result = Some(result);
            }
        }

        self.close_current(log_end)
    }

    pub fn current(&self) -> Option<&TimelineSegment> {
        self.segments.last().filter(|segment| segment.is_open())
    }

    fn current_mut(&mut self) -> Option<&mut TimelineSegment> {
        self.segments.last_mut().filter(|segment| segment.is_open())
    }

    pub fn last_boss_encounter(&self) -> Option<&TimelineSegment> {
        self.segments
            .iter()
            .rev()
            .find(|segment| segment.kind == SegmentKind::BossEncounter)
    }

    pub fn open_count(&self) -> usize {
        self.segments.iter().filter(|segment| segment.is_open()).count()
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
