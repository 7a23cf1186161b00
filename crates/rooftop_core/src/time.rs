//! Render-clock bookkeeping for a caller-driven frame loop.
//!
//! The host calls `begin_frame(timestamp)` once per rendered frame with its own
//! monotonic timestamp (seconds). The clock turns that into a sanitized frame
//! delta: the first frame, backwards time, and NaN all yield zero, and stalls
//! (tab backgrounded, debugger pause) are capped at `max_frame_time` so the
//! fixed-step catch-up loop downstream stays bounded.

const FPS_SAMPLE_COUNT: usize = 60;

pub struct FrameClock {
    pub max_frame_time: f64,
    last_timestamp: Option<f64>,
    pub frame_delta: f64,
    pub frame_count: u64,
    pub total_time: f64,

    fps_samples: [f64; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f64,
    pub smoothed_frame_time_ms: f64,
}

impl FrameClock {
    pub fn new(max_frame_time: f64) -> Self {
        Self {
            max_frame_time,
            last_timestamp: None,
            frame_delta: 0.0,
            frame_count: 0,
            total_time: 0.0,
            fps_samples: [1.0 / 60.0; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: 60.0,
            smoothed_frame_time_ms: 16.667,
        }
    }

    /// Feed the host's render timestamp and return the clamped delta for this frame.
    pub fn begin_frame(&mut self, timestamp: f64) -> f64 {
        let raw = match self.last_timestamp {
            Some(last) => timestamp - last,
            None => 0.0,
        };
        if timestamp.is_finite() {
            self.last_timestamp = Some(timestamp);
        }

        let mut delta = raw;
        if !delta.is_finite() || delta < 0.0 {
            log::debug!("Discarding non-monotonic frame delta {raw}");
            delta = 0.0;
        }

        // Spiral-of-death cap
        if delta > self.max_frame_time {
            log::warn!(
                "Frame took {:.1}ms, capping delta to {}ms",
                delta * 1000.0,
                self.max_frame_time * 1000.0
            );
            delta = self.max_frame_time;
        }

        self.frame_delta = delta;
        self.total_time += delta;
        self.frame_count += 1;

        if delta > 0.0 {
            self.fps_samples[self.fps_sample_index] = delta;
            self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
            let avg_dt: f64 = self.fps_samples.iter().sum::<f64>() / FPS_SAMPLE_COUNT as f64;
            self.smoothed_frame_time_ms = avg_dt * 1000.0;
            self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };
        }

        delta
    }

    /// Forget the last timestamp so the next frame starts from a zero delta.
    /// Used when resuming from pause so the paused wall time is not replayed.
    pub fn resync(&mut self) {
        self.last_timestamp = None;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(0.25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_has_zero_delta() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.begin_frame(12.5), 0.0);
        assert_eq!(clock.frame_count, 1);
    }

    #[test]
    fn delta_is_difference_between_timestamps() {
        let mut clock = FrameClock::default();
        clock.begin_frame(1.0);
        let delta = clock.begin_frame(1.016);
        assert!((delta - 0.016).abs() < 1e-9);
        assert!((clock.total_time - 0.016).abs() < 1e-9);
    }

    #[test]
    fn stalled_frame_is_capped() {
        let mut clock = FrameClock::new(0.25);
        clock.begin_frame(0.0);
        let delta = clock.begin_frame(10.0);
        assert_eq!(delta, 0.25);
    }

    #[test]
    fn backwards_or_nan_timestamps_yield_zero() {
        let mut clock = FrameClock::default();
        clock.begin_frame(5.0);
        assert_eq!(clock.begin_frame(4.0), 0.0);
        assert_eq!(clock.begin_frame(f64::NAN), 0.0);
        // NaN is not remembered; the next valid frame measures from 4.0.
        let delta = clock.begin_frame(4.01);
        assert!((delta - 0.01).abs() < 1e-9);
    }

    #[test]
    fn resync_discards_paused_wall_time() {
        let mut clock = FrameClock::default();
        clock.begin_frame(1.0);
        clock.resync();
        assert_eq!(clock.begin_frame(100.0), 0.0);
    }

    #[test]
    fn smoothed_fps_tracks_steady_cadence() {
        let mut clock = FrameClock::default();
        let mut t = 0.0;
        for _ in 0..=FPS_SAMPLE_COUNT {
            clock.begin_frame(t);
            t += 1.0 / 30.0;
        }
        assert!((clock.smoothed_fps - 30.0).abs() < 0.01);
        assert!((clock.smoothed_frame_time_ms - 33.333).abs() < 0.01);
    }
}
