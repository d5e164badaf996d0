use serde::{Deserialize, Serialize};

use crate::Note;

/// Duration as a multiple of the reference quarter note, kept in lowest terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DurationRatio {
    num: u32,
    den: u32,
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl DurationRatio {
    pub const ONE: DurationRatio = DurationRatio { num: 1, den: 1 };
    pub const HALF: DurationRatio = DurationRatio { num: 1, den: 2 };

    /// `None` for a zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        let g = gcd(num, den);
        Some(Self {
            num: num / g,
            den: den / g,
        })
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Notation suffix: empty for 1, `2`, `/2`, `3/2`.
    pub fn suffix(&self) -> String {
        match (self.num, self.den) {
            (1, 1) => String::new(),
            (n, 1) => n.to_string(),
            (1, d) => format!("/{}", d),
            (n, d) => format!("{}/{}", n, d),
        }
    }
}

impl Default for DurationRatio {
    fn default() -> Self {
        Self::ONE
    }
}

/// The five lengths a timed note is quantized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationBucket {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl DurationBucket {
    /// Quantize a length measured in quarter notes.
    pub fn from_ratio(quarters: f64) -> Self {
        if quarters >= 3.5 {
            DurationBucket::Whole
        } else if quarters >= 1.75 {
            DurationBucket::Half
        } else if quarters >= 0.75 {
            DurationBucket::Quarter
        } else if quarters >= 0.375 {
            DurationBucket::Eighth
        } else {
            DurationBucket::Sixteenth
        }
    }

    pub fn ratio(&self) -> DurationRatio {
        let (num, den) = match self {
            DurationBucket::Whole => (4, 1),
            DurationBucket::Half => (2, 1),
            DurationBucket::Quarter => (1, 1),
            DurationBucket::Eighth => (1, 2),
            DurationBucket::Sixteenth => (1, 4),
        };
        DurationRatio { num, den }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            DurationBucket::Whole => "4",
            DurationBucket::Half => "2",
            DurationBucket::Quarter => "",
            DurationBucket::Eighth => "/2",
            DurationBucket::Sixteenth => "/4",
        }
    }
}

/// One decoded notation element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotationItem {
    Note { note: Note, duration: DurationRatio },
    Rest { duration: DurationRatio },
}

impl NotationItem {
    pub fn duration(&self) -> DurationRatio {
        match self {
            NotationItem::Note { duration, .. } | NotationItem::Rest { duration } => *duration,
        }
    }

    pub fn note(&self) -> Option<Note> {
        match self {
            NotationItem::Note { note, .. } => Some(*note),
            NotationItem::Rest { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_reduces() {
        let r = DurationRatio::new(4, 8).unwrap();
        assert_eq!((r.num(), r.den()), (1, 2));
        assert!(DurationRatio::new(0, 3).is_none());
        assert!(DurationRatio::new(3, 0).is_none());
    }

    #[test]
    fn suffixes() {
        assert_eq!(DurationRatio::ONE.suffix(), "");
        assert_eq!(DurationRatio::new(2, 1).unwrap().suffix(), "2");
        assert_eq!(DurationRatio::new(1, 4).unwrap().suffix(), "/4");
        assert_eq!(DurationRatio::new(3, 2).unwrap().suffix(), "3/2");
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(DurationBucket::from_ratio(3.5), DurationBucket::Whole);
        assert_eq!(DurationBucket::from_ratio(3.49), DurationBucket::Half);
        assert_eq!(DurationBucket::from_ratio(1.75), DurationBucket::Half);
        assert_eq!(DurationBucket::from_ratio(1.0), DurationBucket::Quarter);
        assert_eq!(DurationBucket::from_ratio(0.75), DurationBucket::Quarter);
        assert_eq!(DurationBucket::from_ratio(0.375), DurationBucket::Eighth);
        assert_eq!(DurationBucket::from_ratio(0.1), DurationBucket::Sixteenth);
        for b in [
            DurationBucket::Whole,
            DurationBucket::Half,
            DurationBucket::Quarter,
            DurationBucket::Eighth,
            DurationBucket::Sixteenth,
        ] {
            assert_eq!(b.ratio().suffix(), b.suffix());
        }
    }
}
