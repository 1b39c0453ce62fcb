use crate::error::{PracticeError, Result};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch shown for notes that carry no pitch information (tap input,
/// generated rhythm exercises). Middle line of the treble staff.
pub const RHYTHM_PITCH_NAME: &str = "B4";

/// Fractional MIDI note number for a frequency (A4 = 440 Hz = 69).
pub fn freq_to_midi(freq_hz: f64) -> f64 {
    69.0 + 12.0 * (freq_hz / 440.0).log2()
}

/// Signed distance from `f2` to `f1` in cents.
///
/// Written as a difference of logarithms so that swapping the arguments
/// negates the result exactly.
pub fn cents_between(f1: f64, f2: f64) -> f64 {
    1200.0 * (f1.log2() - f2.log2())
}

/// Scientific pitch name, e.g. 60 -> "C4", 69 -> "A4".
pub fn midi_to_name(midi: i32) -> String {
    let name = NOTE_NAMES[(midi.rem_euclid(12)) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Split a pitch name like "Bb3" or "F#4" into (step, alter, octave).
pub fn parse_pitch_name(name: &str) -> Result<(char, i32, i32)> {
    let invalid = || PracticeError::InvalidPitchName(name.to_string());
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    let step = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| ('A'..='G').contains(c))
        .ok_or_else(invalid)?;
    let rest = chars.as_str();

    let (alter, octave_str) = if let Some(stripped) = rest.strip_prefix('#') {
        (1, stripped)
    } else if let Some(stripped) = rest.strip_prefix('b') {
        (-1, stripped)
    } else {
        (0, rest)
    };

    let octave: i32 = octave_str.parse().map_err(|_| invalid())?;
    Ok((step, alter, octave))
}

/// Note input encodes pitch in tenths of a Hertz.
pub fn deci_hz_to_freq(pitch_deci_hz: u32) -> f64 {
    pitch_deci_hz as f64 / 10.0
}

pub fn freq_to_deci_hz(freq_hz: f64) -> u32 {
    (freq_hz * 10.0).round().max(0.0) as u32
}

/// Nearest equal-tempered pitch name, or `None` for unpitched input.
pub fn pitch_name_from_deci_hz(pitch_deci_hz: u32) -> Option<String> {
    if pitch_deci_hz == 0 {
        return None;
    }
    let midi = freq_to_midi(deci_hz_to_freq(pitch_deci_hz)).round() as i32;
    Some(midi_to_name(midi))
}
