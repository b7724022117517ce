//! Culling statistics.

/// Summary of one culling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Candidates voted on.
    pub total: u32,
    /// Candidates accepted.
    pub visible: u32,
}

impl CullStats {
    /// Creates stats from the candidate and visible counts.
    #[must_use]
    pub const fn new(total: u32, visible: u32) -> Self {
        Self { total, visible }
    }

    /// Candidates rejected.
    #[must_use]
    pub const fn culled(&self) -> u32 {
        self.total.saturating_sub(self.visible)
    }

    /// Fraction rejected, 0 for an empty pass.
    #[must_use]
    pub fn cull_rate(&self) -> f32 {
        if self.total > 0 {
            self.culled() as f32 / self.total as f32
        } else {
            0.0
        }
    }

    /// Returns true if the visible count cannot be right.
    #[must_use]
    pub const fn is_inconsistent(&self) -> bool {
        self.visible > self.total
    }
}

impl std::fmt::Display for CullStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {} visible ({} culled, {:.1}%)",
            self.visible,
            self.total,
            self.culled(),
            self.cull_rate() * 100.0
        )
    }
}
