use serde::Serialize;
use std::fmt;

/// Age partition of `[0, ∞)`.
///
/// | Range       | Bucket |
/// |-------------|--------|
/// | [0, 20)     | 0-20   |
/// | [20, 30)    | 21-30  |
/// | [30, 40)    | 31-40  |
/// | [40, 50)    | 41-50  |
/// | [50, 60)    | 51-60  |
/// | [60, ∞)     | 60+    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeBucket {
    UpTo20,
    From21To30,
    From31To40,
    From41To50,
    From51To60,
    Over60,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 6] = [
        AgeBucket::UpTo20,
        AgeBucket::From21To30,
        AgeBucket::From31To40,
        AgeBucket::From41To50,
        AgeBucket::From51To60,
        AgeBucket::Over60,
    ];

    /// Bucket containing `age`; `None` for negative or non-finite ages.
    pub fn of(age: f64) -> Option<Self> {
        match age {
            a if !a.is_finite() || a < 0.0 => None,
            a if a < 20.0 => Some(AgeBucket::UpTo20),
            a if a < 30.0 => Some(AgeBucket::From21To30),
            a if a < 40.0 => Some(AgeBucket::From31To40),
            a if a < 50.0 => Some(AgeBucket::From41To50),
            a if a < 60.0 => Some(AgeBucket::From51To60),
            _ => Some(AgeBucket::Over60),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeBucket::UpTo20 => "0-20",
            AgeBucket::From21To30 => "21-30",
            AgeBucket::From31To40 => "31-40",
            AgeBucket::From41To50 => "41-50",
            AgeBucket::From51To60 => "51-60",
            AgeBucket::Over60 => "60+",
        }
    }

    /// Position in the natural order.
    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label)
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for AgeBucket {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
