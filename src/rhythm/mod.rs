pub mod converter;
pub mod duration;
pub mod snapper;
pub mod time_signature;
pub mod types;

pub use converter::RawToDiscreteConverter;
pub use duration::{fit_durations, validate_resolution, DurationValue};
pub use snapper::{SnapperConfig, SubdivisionSnapper};
pub use time_signature::TimeSignature;
pub use types::{
    DiscreteMeasure, DiscreteNote, DiscretePassage, DiscreteRest, ElementKind, MeasureElement,
    RawNote, RawPassage, RawPassageNote,
};
