//! Key estimation from the accumulated pitch-class histogram
//!
//! The tonal center is the strongest pitch class. The mode comes from the
//! third above it: if the minor third (+3 semitones) carries strictly more
//! energy than the major third (+4), the key is minor.

use std::fmt;

/// Pitch-class names, index 0 = C
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Label used when no key can be derived
pub const UNKNOWN_KEY: &str = "Unknown";

/// Chroma energy accumulated over time, one bin per pitch class
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PitchClassHistogram {
    energies: [f32; 12],
}

impl PitchClassHistogram {
    pub fn new(energies: [f32; 12]) -> Self {
        Self { energies }
    }

    /// Energy of a pitch class (index taken modulo 12)
    pub fn energy(&self, pitch_class: usize) -> f32 {
        self.energies[pitch_class % 12]
    }

    pub fn energies(&self) -> &[f32; 12] {
        &self.energies
    }
}

/// Major or minor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    Minor,
}

/// A tonal center plus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicalKey {
    /// Root pitch class (0-11, where 0=C)
    pub tonic: u8,
    pub mode: Mode,
}

impl MusicalKey {
    /// Name of the root pitch class
    pub fn tonic_name(&self) -> &'static str {
        PITCH_CLASS_NAMES[self.tonic as usize % 12]
    }
}

impl fmt::Display for MusicalKey {
    /// "A" for A major, "Am" for A minor
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Mode::Major => write!(f, "{}", self.tonic_name()),
            Mode::Minor => write!(f, "{}m", self.tonic_name()),
        }
    }
}

/// Pick the key of a pitch-class histogram
///
/// Ties for the strongest class resolve to the lowest index (C before C#, ...).
/// Returns None for an all-zero or non-finite histogram.
pub fn estimate_key(histogram: &PitchClassHistogram) -> Option<MusicalKey> {
    let energies = histogram.energies();
    if energies.iter().any(|e| !e.is_finite()) {
        return None;
    }

    let mut key_idx = 0;
    for (pc, &energy) in energies.iter().enumerate().skip(1) {
        if energy > energies[key_idx] {
            key_idx = pc;
        }
    }
    if energies[key_idx] <= 0.0 {
        return None;
    }

    let major_third = histogram.energy(key_idx + 4);
    let minor_third = histogram.energy(key_idx + 3);
    let mode = if minor_third > major_third {
        Mode::Minor
    } else {
        Mode::Major
    };

    Some(MusicalKey {
        tonic: key_idx as u8,
        mode,
    })
}

/// Key label for the result record: "C", "F#m", or "Unknown"
pub fn key_label(key: Option<MusicalKey>) -> String {
    key.map(|key| key.to_string())
        .unwrap_or_else(|| UNKNOWN_KEY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(pairs: &[(usize, f32)]) -> PitchClassHistogram {
        let mut energies = [0.1f32; 12];
        for &(pc, e) in pairs {
            energies[pc] = e;
        }
        PitchClassHistogram::new(energies)
    }

    #[test]
    fn test_major_key() {
        // C with a strong E (major third)
        let h = histogram(&[(0, 5.0), (4, 2.0), (3, 1.0)]);
        assert_eq!(key_label(estimate_key(&h)), "C");
    }

    #[test]
    fn test_minor_key() {
        // A with a strong C (minor third)
        let h = histogram(&[(9, 5.0), (0, 2.0), (1, 1.0)]);
        let key = estimate_key(&h).unwrap();
        assert_eq!(key.mode, Mode::Minor);
        assert_eq!(key.to_string(), "Am");
    }

    #[test]
    fn test_equal_thirds_are_major() {
        let h = histogram(&[(7, 5.0), (10, 2.0), (11, 2.0)]);
        assert_eq!(key_label(estimate_key(&h)), "G");
    }

    #[test]
    fn test_tie_breaks_to_lower_index() {
        let h = histogram(&[(2, 3.0), (9, 3.0)]);
        assert_eq!(estimate_key(&h).unwrap().tonic, 2);

        let h = histogram(&[(11, 3.0), (1, 3.0)]);
        assert_eq!(estimate_key(&h).unwrap().tonic, 1);
    }

    #[test]
    fn test_thirds_wrap_around() {
        // B: minor third is D (2), major third is D# (3)
        let h = histogram(&[(11, 5.0), (2, 3.0), (3, 1.0)]);
        assert_eq!(key_label(estimate_key(&h)), "Bm");
    }

    #[test]
    fn test_sharp_names() {
        let h = histogram(&[(6, 5.0)]);
        assert_eq!(key_label(estimate_key(&h)), "F#");
    }

    #[test]
    fn test_degenerate_histograms_are_unknown() {
        assert_eq!(key_label(estimate_key(&PitchClassHistogram::default())), UNKNOWN_KEY);

        let mut energies = [1.0f32; 12];
        energies[4] = f32::NAN;
        assert_eq!(key_label(estimate_key(&PitchClassHistogram::new(energies))), UNKNOWN_KEY);
    }
}
