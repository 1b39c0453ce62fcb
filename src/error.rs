use thiserror::Error;

/// Errors raised for invalid caller input.
///
/// Detectors and the quantizer never return these for "nothing found";
/// that is expressed as `None` or an empty result.
#[derive(Debug, Error)]
pub enum PracticeError {
    /// Time signature string could not be parsed
    #[error("Invalid time signature: {0:?}")]
    InvalidTimeSignature(String),

    /// Subdivision resolution is not one of 1, 2, 4, 8, 16, 32
    #[error("Unsupported subdivision resolution: {0}")]
    UnsupportedResolution(u32),

    /// Resolution cannot express a whole number of subdivisions per measure
    #[error("Resolution {resolution} does not divide a {numerator}/{denominator} measure")]
    IncompatibleResolution {
        numerator: u32,
        denominator: u32,
        resolution: u32,
    },

    /// Note value is not whole..32nd with at most two dots
    #[error("Invalid note value: 1/{denominator} with {dots} dots")]
    InvalidDuration { denominator: u32, dots: u8 },

    /// Measure count times subdivisions per measure does not fit in u32
    #[error("Passage of {0} measures is too long")]
    PassageTooLong(u32),

    /// A passage must have at least one measure
    #[error("Measure count must be at least 1")]
    ZeroMeasureCount,

    /// Tempo must be a positive, finite number of beats per minute
    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),

    /// Tempo subdivision must be a positive note value
    #[error("Invalid tempo subdivision: {0}")]
    InvalidTempoSubdivision(u32),

    /// Pitch name could not be parsed (expected e.g. "C#4")
    #[error("Invalid pitch name: {0:?}")]
    InvalidPitchName(String),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// MusicXML writer failure
    #[error("MusicXML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Writer produced bytes that are not UTF-8
    #[error("MusicXML output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for rhythm and notation operations
pub type Result<T> = std::result::Result<T, PracticeError>;
