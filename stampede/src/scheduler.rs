use stampede_core::{ConfigError, Stage};
use std::time::Duration;

/// Maps elapsed run time onto a target virtual-user count.
///
/// Each stage ramps linearly from the previous stage's target (or the starting VU count for the
/// first stage) to its own target. Stages whose start and end targets are equal are plateaus.
#[derive(Debug, Clone)]
pub struct StageScheduler {
    segments: Vec<Segment>,
    start_vus: usize,
    total: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: Duration,
    duration: Duration,
    from: usize,
    to: usize,
}

impl StageScheduler {
    pub fn new(stages: &[Stage], start_vus: usize) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::NoStages);
        }

        let mut segments = Vec::with_capacity(stages.len());
        let mut start = Duration::ZERO;
        let mut from = start_vus;
        for stage in stages {
            segments.push(Segment {
                start,
                duration: stage.duration,
                from,
                to: stage.target,
            });
            start = start
                .checked_add(stage.duration)
                .ok_or(ConfigError::ScheduleTooLong)?;
            from = stage.target;
        }

        Ok(Self {
            segments,
            start_vus,
            total: start,
        })
    }

    /// Target VU count at `elapsed`, rounded to the nearest integer. Past the end of the
    /// schedule the last stage's target holds.
    pub fn target_at(&self, elapsed: Duration) -> usize {
        match self.segment_at(elapsed) {
            Some((_, seg)) => {
                let progress = (elapsed - seg.start).as_secs_f64() / seg.duration.as_secs_f64();
                let from = seg.from as f64;
                let to = seg.to as f64;
                (from + (to - from) * progress).round() as usize
            }
            None => self.segments.last().map_or(self.start_vus, |s| s.to),
        }
    }

    /// Index of the stage active at `elapsed`, `None` once the schedule is over.
    pub fn stage_at(&self, elapsed: Duration) -> Option<usize> {
        self.segment_at(elapsed).map(|(idx, _)| idx)
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.total
    }

    fn segment_at(&self, elapsed: Duration) -> Option<(usize, &Segment)> {
        // NOTE: Zero-length stages never match, so their target is reached instantly.
        self.segments
            .iter()
            .enumerate()
            .find(|(_, seg)| elapsed >= seg.start && elapsed < seg.start + seg.duration)
    }
}
