/// Hit counter with a win threshold. Only ever counts up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreTracker {
    score: u32,
    threshold: u32,
}

impl ScoreTracker {
    pub fn new(threshold: u32) -> Self {
        Self { score: 0, threshold }
    }

    pub fn record_hit(&mut self) -> u32 {
        self.score = self.score.saturating_add(1);
        self.score
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn has_won(&self) -> bool {
        self.score >= self.threshold
    }
}
