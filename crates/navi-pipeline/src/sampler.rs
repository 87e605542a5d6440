//! Temporal frame sampling.

/// Selects every Nth ingested frame for detection.
///
/// Frames are counted per session across batches and clips. The first
/// frame of a session is always sampled, then every `every_n`-th after it
/// (0-based indices 0, N, 2N, ...).
#[derive(Debug, Clone)]
pub struct FrameSampler {
    every_n: u64,
    frame_counter: u64,
}

impl FrameSampler {
    pub fn new(every_n: u32) -> Self {
        Self {
            every_n: u64::from(every_n.max(1)),
            frame_counter: 0,
        }
    }

    /// Count one ingested frame. Returns its 0-based index when it is
    /// selected for processing.
    pub fn next_frame(&mut self) -> Option<u64> {
        let index = self.frame_counter;
        self.frame_counter += 1;
        (index % self.every_n == 0).then_some(index)
    }

    /// Frames counted so far.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn every_n(&self) -> u64 {
        self.every_n
    }
}
