use log::{debug, trace};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::pitch::{rms, DetectorKind, PitchDetectionAlgorithm, PitchDetectorConfig, PitchEstimate};
use crate::tuning::cents_between;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateDetectorConfig {
    /// Estimates closer than this (in cents) to any member of a group join it.
    pub cents_tolerance: f64,
    /// Minimum number of detectors that must return an estimate at all.
    pub minimum_consensus: usize,
    /// Require the winning group to hold more than half of all detectors.
    pub require_majority: bool,
}

impl Default for AggregateDetectorConfig {
    fn default() -> Self {
        AggregateDetectorConfig {
            cents_tolerance: 50.0,
            minimum_consensus: 2,
            require_majority: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatePitchEstimate {
    pub frequency: f32,
    pub confidence: f32,
    /// Every estimate returned, including those outside the winning group.
    pub estimates: Vec<PitchEstimate>,
    pub consensus_count: usize,
    pub total_algorithms: usize,
}

impl AggregatePitchEstimate {
    pub fn midi_note(&self) -> f32 {
        69.0 + 12.0 * (self.frequency / 440.0).log2()
    }

    pub fn cents_deviation(&self) -> f32 {
        let midi = self.midi_note();
        (midi - midi.round()) * 100.0
    }
}

/// Runs every detector over the same buffer and reconciles their answers.
pub struct AggregateDetector {
    detectors: Vec<Box<dyn PitchDetectionAlgorithm>>,
    config: AggregateDetectorConfig,
}

impl AggregateDetector {
    /// All five detectors with default thresholds.
    pub fn new(config: AggregateDetectorConfig) -> Self {
        let detectors = DetectorKind::ALL.iter().map(|kind| kind.detector()).collect();
        Self::with_detectors(detectors, config)
    }

    pub fn with_detectors(
        detectors: Vec<Box<dyn PitchDetectionAlgorithm>>,
        config: AggregateDetectorConfig,
    ) -> Self {
        AggregateDetector { detectors, config }
    }

    pub fn config(&self) -> &AggregateDetectorConfig {
        &self.config
    }

    pub fn total_algorithms(&self) -> usize {
        self.detectors.len()
    }

    pub fn detect(
        &self,
        samples: &[f32],
        sample_rate: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Option<AggregatePitchEstimate> {
        let results = self.run_detectors(samples, sample_rate, min_freq, max_freq);
        for (detector, result) in self.detectors.iter().zip(&results) {
            trace!("{}: {:?}", detector.kind(), result);
        }
        let estimates: Vec<PitchEstimate> = results.into_iter().flatten().collect();
        reconcile(estimates, self.total_algorithms(), &self.config)
    }

    /// Fan out one task per detector and wait for all of them. Each task
    /// writes only its own slot.
    #[cfg(not(target_arch = "wasm32"))]
    fn run_detectors(
        &self,
        samples: &[f32],
        sample_rate: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Vec<Option<PitchEstimate>> {
        let results = Mutex::new(vec![None; self.detectors.len()]);
        rayon::scope(|scope| {
            for (index, detector) in self.detectors.iter().enumerate() {
                let results = &results;
                scope.spawn(move |_| {
                    let estimate = detector.detect(samples, sample_rate, min_freq, max_freq);
                    results.lock()[index] = estimate;
                });
            }
        });
        results.into_inner()
    }

    #[cfg(target_arch = "wasm32")]
    fn run_detectors(
        &self,
        samples: &[f32],
        sample_rate: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Vec<Option<PitchEstimate>> {
        let results = Mutex::new(vec![None; self.detectors.len()]);
        for (index, detector) in self.detectors.iter().enumerate() {
            results.lock()[index] = detector.detect(samples, sample_rate, min_freq, max_freq);
        }
        results.into_inner()
    }
}

/// Single-linkage grouping: an estimate joins every group that has a member
/// within `tolerance_cents` of it, merging those groups. Groups hold indices
/// into `estimates` and are ordered by their first member.
pub fn cluster_by_cents(estimates: &[PitchEstimate], tolerance_cents: f64) -> Vec<Vec<usize>> {
    let close = |a: usize, b: usize| {
        cents_between(estimates[a].frequency as f64, estimates[b].frequency as f64).abs()
            <= tolerance_cents
    };

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for index in 0..estimates.len() {
        let (joined, rest): (Vec<Vec<usize>>, Vec<Vec<usize>>) = groups
            .into_iter()
            .partition(|group| group.iter().any(|&member| close(index, member)));
        let mut merged: Vec<usize> = joined.into_iter().flatten().collect();
        merged.push(index);
        merged.sort_unstable();
        groups = rest;
        groups.push(merged);
    }
    groups.sort_by_key(|group| group[0]);
    groups
}

/// Frequency at which the cumulative confidence of the frequency-sorted
/// members first reaches half of the total.
fn weighted_median(members: &[&PitchEstimate]) -> f32 {
    let mut sorted = members.to_vec();
    sorted.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));

    let total: f32 = sorted.iter().map(|e| e.confidence).sum();
    if !(total > 0.0) {
        return sorted[sorted.len() / 2].frequency;
    }
    let half = total / 2.0;
    let mut cumulative = 0.0f32;
    for estimate in &sorted {
        cumulative += estimate.confidence;
        if cumulative >= half {
            return estimate.frequency;
        }
    }
    sorted[sorted.len() - 1].frequency
}

/// Vote over the estimates returned by `total_algorithms` detectors.
pub fn reconcile(
    estimates: Vec<PitchEstimate>,
    total_algorithms: usize,
    config: &AggregateDetectorConfig,
) -> Option<AggregatePitchEstimate> {
    if estimates.is_empty() || estimates.len() < config.minimum_consensus {
        debug!(
            "only {} of {} detectors produced an estimate",
            estimates.len(),
            total_algorithms
        );
        return None;
    }

    let groups = cluster_by_cents(&estimates, config.cents_tolerance);
    let mut winner: Option<(&Vec<usize>, f32)> = None;
    for group in &groups {
        let weight: f32 = group.iter().map(|&i| estimates[i].confidence).sum();
        let better = match winner {
            None => true,
            Some((best, best_weight)) => {
                group.len() > best.len() || (group.len() == best.len() && weight > best_weight)
            }
        };
        if better {
            winner = Some((group, weight));
        }
    }
    let (group, weight) = winner?;

    let consensus_count = group.len();
    if config.require_majority && consensus_count * 2 <= total_algorithms {
        debug!(
            "no majority: largest group has {} of {} detectors",
            consensus_count, total_algorithms
        );
        return None;
    }

    let members: Vec<&PitchEstimate> = group.iter().map(|&i| &estimates[i]).collect();
    let frequency = weighted_median(&members);
    let average = weight / consensus_count as f32;
    let agreement = consensus_count as f32 / total_algorithms.max(1) as f32;
    let confidence = average * (0.5 + 0.5 * agreement);

    Some(AggregatePitchEstimate {
        frequency,
        confidence,
        estimates,
        consensus_count,
        total_algorithms,
    })
}

/// Aggregate detection over fixed-size frames with a silence gate.
pub struct PitchTracker {
    config: PitchDetectorConfig,
    detector: AggregateDetector,
}

impl PitchTracker {
    pub fn new(config: PitchDetectorConfig, aggregate: AggregateDetectorConfig) -> Self {
        PitchTracker {
            config,
            detector: AggregateDetector::new(aggregate),
        }
    }

    pub fn config(&self) -> &PitchDetectorConfig {
        &self.config
    }

    pub fn aggregate_config(&self) -> &AggregateDetectorConfig {
        self.detector.config()
    }

    /// Follow a new input rate, keeping every other setting.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if self.config.sample_rate != sample_rate {
            debug!(
                "pitch tracker sample rate {} -> {}",
                self.config.sample_rate, sample_rate
            );
            self.config.sample_rate = sample_rate;
        }
    }

    /// Analyses the most recent `buffer_size` samples.
    pub fn detect(&self, samples: &[f32]) -> Option<AggregatePitchEstimate> {
        let start = samples.len().saturating_sub(self.config.buffer_size);
        let frame = &samples[start..];
        if rms(frame) < self.config.silence_rms {
            return None;
        }
        self.detector.detect(
            frame,
            self.config.sample_rate,
            self.config.min_frequency,
            self.config.max_frequency,
        )
    }
}
