use std::fmt;

/// The stages of a digest run, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Fetch,
    Classify,
    Extract,
    Research,
    Analyze,
    Critique,
    Send,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Fetch,
        Stage::Classify,
        Stage::Extract,
        Stage::Research,
        Stage::Analyze,
        Stage::Critique,
        Stage::Send,
    ];

    /// Stable name used for saga steps, logs and recovery contexts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Classify => "classify",
            Self::Extract => "extract",
            Self::Research => "research",
            Self::Analyze => "analyze",
            Self::Critique => "critique",
            Self::Send => "send",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
