//! Frame clock: turns host timestamps into elapsed seconds.
//!
//! The host calls [`FrameClock::update`] once per rendered frame with a
//! millisecond timestamp (`performance.now()`, `Instant` offsets, ...). The
//! returned delta is fed straight into the tick engine. There is no fixed
//! step and no cap: a long pause yields one large delta.

#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    /// Timestamp of the last update (ms), None before the first frame.
    last_timestamp: Option<f64>,
    /// Total simulated seconds handed out so far.
    pub total_secs: f64,
    /// Frames seen, including the first.
    pub frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a wall-clock timestamp and get the seconds since the previous one.
    ///
    /// The first frame returns 0. Timestamps that go backwards also return 0
    /// and become the new reference.
    pub fn update(&mut self, now_ms: f64) -> f64 {
        let delta = match self.last_timestamp {
            Some(prev) if now_ms > prev => (now_ms - prev) / 1000.0,
            _ => 0.0,
        };
        self.last_timestamp = Some(now_ms);
        self.frames += 1;
        self.total_secs += delta;
        delta
    }
}
