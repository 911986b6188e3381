use std::time::Duration;

use super::config::Stage;

#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Piecewise-linear target rate over elapsed time.
///
/// Stage `i` ramps linearly from the previous stage's target (or `start` for the first
/// stage) to its own target over its duration. After the last stage the schedule is done.
#[derive(Debug, Clone)]
pub struct RampingSchedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl RampingSchedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    /// Highest rate the schedule ever asks for.
    pub fn max_target(&self) -> u64 {
        self.stages
            .iter()
            .map(|s| s.target)
            .max()
            .unwrap_or(0)
            .max(self.start)
    }

    fn stage_index(&self, elapsed: Duration) -> usize {
        // The first stage whose end is >= elapsed.
        match self
            .cumulative_ends
            .binary_search_by(|end| end.cmp(&elapsed))
        {
            Ok(i) | Err(i) => i.min(self.stages.len().saturating_sub(1)),
        }
    }

    fn stage_bounds(&self, idx: usize) -> (Duration, Duration, u64, u64) {
        let stage_start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        let start_target = if idx == 0 {
            self.start
        } else {
            self.stages[idx - 1].target
        };
        (
            stage_start,
            self.cumulative_ends[idx],
            start_target,
            self.stages[idx].target,
        )
    }

    /// Interpolated rate at `elapsed`, exact (not rounded).
    pub fn rate_at(&self, elapsed: Duration) -> f64 {
        if self.stages.is_empty() || elapsed.is_zero() {
            return self.start as f64;
        }
        if elapsed >= self.total_duration() {
            return self.stages.last().map_or(self.start, |s| s.target) as f64;
        }

        let idx = self.stage_index(elapsed);
        let (stage_start, stage_end, start_target, end_target) = self.stage_bounds(idx);
        let stage_duration = stage_end.saturating_sub(stage_start);
        if stage_duration.is_zero() {
            return end_target as f64;
        }

        let frac = elapsed.saturating_sub(stage_start).as_secs_f64() / stage_duration.as_secs_f64();
        start_target as f64 + (end_target as f64 - start_target as f64) * frac
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if self.stages.is_empty() || elapsed.is_zero() {
            return self.start;
        }
        if elapsed >= self.total_duration() {
            return self.stages.last().map_or(self.start, |s| s.target);
        }

        let idx = self.stage_index(elapsed);
        let (stage_start, stage_end, start_target, end_target) = self.stage_bounds(idx);
        let stage_duration = stage_end.saturating_sub(stage_start);
        if stage_duration.is_zero() {
            return end_target;
        }

        // Linear interpolation across the stage.
        let start_i = start_target as i128;
        let delta = end_target as i128 - start_i;
        let num = elapsed.saturating_sub(stage_start).as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        let cur = start_i + (delta.saturating_mul(num) / den.max(1));
        cur.clamp(0, u64::MAX as i128) as u64
    }

    /// Expected number of arrivals in `[0, elapsed]`: the integral of the rate curve, in
    /// units of `time_unit`. Clamped to the schedule's total duration.
    pub fn arrivals_until(&self, elapsed: Duration, time_unit: Duration) -> f64 {
        let unit_s = time_unit.as_secs_f64();
        if self.stages.is_empty() || unit_s <= 0.0 {
            return 0.0;
        }

        let elapsed = elapsed.min(self.total_duration());
        let mut acc = 0.0f64;

        for idx in 0..self.stages.len() {
            let (stage_start, stage_end, start_target, end_target) = self.stage_bounds(idx);
            if elapsed <= stage_start {
                break;
            }

            let stage_s = stage_end.saturating_sub(stage_start).as_secs_f64();
            let t = elapsed.min(stage_end).saturating_sub(stage_start).as_secs_f64();
            if stage_s <= 0.0 {
                continue;
            }

            // Area under the line from `start_target` to `end_target`, cut at `t`.
            let (a, b) = (start_target as f64, end_target as f64);
            acc += a * t + (b - a) * t * t / (2.0 * stage_s);
        }

        acc / unit_s
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        if self.stages.is_empty() {
            return None;
        }

        let clamped = elapsed.min(self.total_duration());
        let idx = self.stage_index(clamped);
        let (stage_start, stage_end, start_target, end_target) = self.stage_bounds(idx);

        let stage_duration = stage_end.saturating_sub(stage_start);
        let stage_elapsed = clamped.saturating_sub(stage_start);

        Some(StageSnapshot {
            index: idx,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: stage_duration.saturating_sub(stage_elapsed),
            start_target,
            end_target,
            current_target: self.target_at(clamped),
        })
    }
}

/// Turns the continuous arrival curve into whole dispatches as time advances.
///
/// Each call to [`ArrivalClock::due_at`] returns how many arrivals became due since the
/// previous call. The running total is always `floor(arrivals_until(elapsed))`, so the
/// fractional remainder is never lost between ticks.
#[derive(Debug)]
pub struct ArrivalClock {
    schedule: RampingSchedule,
    time_unit: Duration,
    emitted: u64,
}

impl ArrivalClock {
    pub fn new(schedule: RampingSchedule, time_unit: Duration) -> Self {
        Self {
            schedule,
            time_unit,
            emitted: 0,
        }
    }

    pub fn due_at(&mut self, elapsed: Duration) -> u64 {
        let total = self.schedule.arrivals_until(elapsed, self.time_unit).floor();
        let total = if total.is_finite() && total > 0.0 {
            total as u64
        } else {
            0
        };
        let due = total.saturating_sub(self.emitted);
        self.emitted = self.emitted.max(total);
        due
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}
