use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{PracticeError, Result};
use crate::rhythm::duration::fit_durations;
use crate::rhythm::time_signature::TimeSignature;
use crate::rhythm::types::{DiscreteMeasure, DiscretePassage, MeasureElement};
use crate::tuning::RHYTHM_PITCH_NAME;

/// Random rhythm-reading passages. The random source is injected so that
/// passages can be reproduced from a seed.
pub struct PassageGenerator<R: Rng> {
    rng: R,
    pitch_name: String,
}

impl PassageGenerator<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        PassageGenerator::new(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        PassageGenerator::new(ChaCha8Rng::from_os_rng())
    }
}

impl<R: Rng> PassageGenerator<R> {
    pub fn new(rng: R) -> Self {
        PassageGenerator {
            rng,
            pitch_name: RHYTHM_PITCH_NAME.to_string(),
        }
    }

    /// Pitch written on every generated note.
    pub fn with_pitch_name(mut self, pitch_name: impl Into<String>) -> Self {
        self.pitch_name = pitch_name.into();
        self
    }

    pub fn generate(
        &mut self,
        measure_count: u32,
        time_signature: TimeSignature,
        resolution: u32,
    ) -> Result<DiscretePassage> {
        if measure_count == 0 {
            return Err(PracticeError::ZeroMeasureCount);
        }
        let spm = time_signature.subdivisions_per_measure(resolution)?;

        let measures = (0..measure_count)
            .map(|index| {
                let first = index == 0;
                let last = index + 1 == measure_count;
                self.generate_measure(first, last, spm, resolution)
            })
            .collect();
        Ok(DiscretePassage::new(measures))
    }

    /// The passage never opens or closes on a rest.
    fn generate_measure(
        &mut self,
        first: bool,
        last: bool,
        spm: u32,
        resolution: u32,
    ) -> DiscreteMeasure {
        let mut elements = Vec::new();
        let mut position = 0;
        while position < spm {
            let span = self.rng.random_range(1..=spm - position);
            let end = position + span;
            let rest_forbidden = (first && position == 0) || (last && end == spm);
            let is_rest = !rest_forbidden && self.rng.random_bool(0.5);

            let durations = fit_durations(position, span, resolution);
            elements.push(if is_rest {
                MeasureElement::rest(durations, position)
            } else {
                MeasureElement::note(self.pitch_name.clone(), durations, position, false)
            });
            position = end;
        }

        let measure = DiscreteMeasure::new(resolution, elements);
        if measure.is_all_rests() && measure.elements.len() > 1 {
            let whole = MeasureElement::rest(fit_durations(0, spm, resolution), 0);
            return DiscreteMeasure::new(resolution, vec![whole]);
        }
        measure
    }
}
