//! Lifecycle states of one scatter-add invocation

use core::fmt;

/// Where a scatter-add invocation currently stands.
///
/// `Idle → Estimating → {DirectScatter | SortedLocalSum | Phase1 → Phase2 → Phase3} → Done`.
/// The deterministic phases are strictly ordered and never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScatterState {
    Idle,
    Estimating,
    DirectScatter,
    SortedLocalSum,
    Phase1,
    Phase2,
    Phase3,
    Done,
}

impl ScatterState {
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }

    /// True for the three barrier-separated stages of the quantized path.
    #[inline]
    #[must_use]
    pub const fn is_deterministic_phase(self) -> bool {
        matches!(self, Self::Phase1 | Self::Phase2 | Self::Phase3)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Estimating => "estimating",
            Self::DirectScatter => "direct-scatter",
            Self::SortedLocalSum => "sorted-local-sum",
            Self::Phase1 => "phase1",
            Self::Phase2 => "phase2",
            Self::Phase3 => "phase3",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ScatterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
