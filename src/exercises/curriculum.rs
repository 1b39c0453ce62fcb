use rand::Rng;
use serde::Serialize;

use crate::error::Result;
use crate::exercises::generators::PassageGenerator;
use crate::rhythm::snapper::SnapperConfig;
use crate::rhythm::time_signature::TimeSignature;
use crate::rhythm::types::DiscretePassage;

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RhythmExercise {
    pub name: String,
    pub description: String,
    pub difficulty: u8,
    pub time_signature: TimeSignature,
    /// Smallest note value that may appear.
    pub resolution: u32,
    pub measure_count: u32,
    pub tempo_range: [f64; 2],
}

impl RhythmExercise {
    /// Grid for playing this exercise at `tempo`, counting the meter's
    /// beat unit.
    pub fn snapper_config(&self, tempo: f64) -> SnapperConfig {
        SnapperConfig {
            tempo,
            tempo_subdivision: self.time_signature.denominator,
            subdivision_resolution: self.resolution,
            time_signature: self.time_signature,
        }
    }

    pub fn generate<R: Rng>(&self, generator: &mut PassageGenerator<R>) -> Result<DiscretePassage> {
        generator.generate(self.measure_count, self.time_signature, self.resolution)
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumStage {
    pub stage: u8,
    pub name: String,
    pub description: String,
    pub exercises: Vec<RhythmExercise>,
}

fn exercise(
    name: &str,
    description: &str,
    difficulty: u8,
    (numerator, denominator): (u32, u32),
    resolution: u32,
    measure_count: u32,
    tempo_range: [f64; 2],
) -> RhythmExercise {
    RhythmExercise {
        name: name.to_string(),
        description: description.to_string(),
        difficulty,
        time_signature: TimeSignature {
            numerator,
            denominator,
        },
        resolution,
        measure_count,
        tempo_range,
    }
}

pub fn get_curriculum() -> Vec<CurriculumStage> {
    vec![
        CurriculumStage {
            stage: 1,
            name: "Beginner".to_string(),
            description: "Whole, half and quarter notes in common time".to_string(),
            exercises: vec![
                exercise(
                    "Quarter Note Pulse",
                    "Clap steady quarter notes and rests",
                    1,
                    (4, 4),
                    4,
                    2,
                    [60.0, 80.0],
                ),
                exercise(
                    "Waltz Time",
                    "Quarter-note rhythms in three",
                    1,
                    (3, 4),
                    4,
                    4,
                    [60.0, 80.0],
                ),
            ],
        },
        CurriculumStage {
            stage: 2,
            name: "Early Beginner".to_string(),
            description: "Eighth notes and dotted quarters".to_string(),
            exercises: vec![
                exercise(
                    "Eighth Notes",
                    "Divide the beat in two",
                    2,
                    (4, 4),
                    8,
                    2,
                    [70.0, 90.0],
                ),
                exercise(
                    "Cut Time",
                    "Feel the half note as the beat",
                    2,
                    (2, 2),
                    8,
                    4,
                    [60.0, 80.0],
                ),
            ],
        },
        CurriculumStage {
            stage: 3,
            name: "Intermediate".to_string(),
            description: "Sixteenth notes and compound meter".to_string(),
            exercises: vec![
                exercise(
                    "Sixteenth Notes",
                    "Divide the beat in four",
                    3,
                    (4, 4),
                    16,
                    2,
                    [70.0, 100.0],
                ),
                exercise(
                    "Six-Eight",
                    "Two dotted-quarter beats per measure",
                    3,
                    (6, 8),
                    8,
                    4,
                    [80.0, 120.0],
                ),
            ],
        },
        CurriculumStage {
            stage: 4,
            name: "Advanced".to_string(),
            description: "Odd meters and thirty-second notes".to_string(),
            exercises: vec![
                exercise(
                    "Five-Four",
                    "Irregular grouping of five beats",
                    4,
                    (5, 4),
                    16,
                    4,
                    [70.0, 110.0],
                ),
                exercise(
                    "Seven-Eight",
                    "Sixteenths in an uneven meter",
                    4,
                    (7, 8),
                    16,
                    4,
                    [90.0, 140.0],
                ),
                exercise(
                    "Thirty-Seconds",
                    "Fast subdivisions in slow common time",
                    4,
                    (4, 4),
                    32,
                    2,
                    [50.0, 70.0],
                ),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::snapper::SubdivisionSnapper;

    #[test]
    fn test_curriculum_structure() {
        let curriculum = get_curriculum();
        assert_eq!(curriculum.len(), 4);
        assert_eq!(curriculum[0].stage, 1);
        assert_eq!(curriculum[3].stage, 4);

        for stage in &curriculum {
            assert!(!stage.exercises.is_empty());
            for ex in &stage.exercises {
                assert!(ex.measure_count > 0);
                assert!(ex.tempo_range[0] <= ex.tempo_range[1]);
                assert!(ex
                    .time_signature
                    .subdivisions_per_measure(ex.resolution)
                    .is_ok());
            }
        }
    }

    #[test]
    fn test_stage_difficulty_progression() {
        let curriculum = get_curriculum();
        for (i, stage) in curriculum.iter().enumerate() {
            let expected_difficulty = (i + 1) as u8;
            for ex in &stage.exercises {
                assert_eq!(
                    ex.difficulty, expected_difficulty,
                    "Exercise '{}' in stage {} has wrong difficulty",
                    ex.name, stage.stage
                );
            }
        }
    }

    #[test]
    fn test_every_exercise_generates() {
        let mut generator = PassageGenerator::seeded(5);
        for stage in get_curriculum() {
            for ex in &stage.exercises {
                let passage = ex.generate(&mut generator).unwrap();
                assert_eq!(passage.measures.len() as u32, ex.measure_count);
                assert!(SubdivisionSnapper::new(ex.snapper_config(ex.tempo_range[0])).is_ok());
            }
        }
    }

    #[test]
    fn test_snapper_config_counts_beat_unit() {
        let six_eight = &get_curriculum()[2].exercises[1];
        let snapper = SubdivisionSnapper::new(six_eight.snapper_config(120.0)).unwrap();
        // eighth-note beat at 120 BPM on an eighth grid
        assert_eq!(snapper.subdivision_ms(), 500.0);
        assert_eq!(snapper.subdivisions_per_measure(), 6);
    }
}
