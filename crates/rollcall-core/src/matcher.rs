//! Descriptor matching against the enrolled gallery.

use crate::types::{FaceDescriptor, Student};

/// Default maximum Euclidean distance for a positive match.
pub const DEFAULT_MAX_DISTANCE: f32 = 0.55;

/// One enrolled (student, descriptor) pair.
#[derive(Debug, Clone)]
pub struct EnrolledFace {
    pub student_id: String,
    pub descriptor: FaceDescriptor,
}

/// Outcome of matching a probe descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched { student_id: String, distance: f32 },
    Unknown,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }
}

/// Nearest-neighbor matcher over the enrolled descriptor set.
///
/// Must be rebuilt whenever the enrolled set changes; a stale matcher
/// mis-attributes check-ins. The engine rebuilds it from the store at the
/// top of every recognition tick.
pub struct EuclideanMatcher {
    enrolled: Vec<EnrolledFace>,
    max_distance: f32,
}

impl EuclideanMatcher {
    /// Build from the current student set. Students without a descriptor
    /// are excluded entirely — they can never match, by invariant.
    pub fn build(students: &[Student], max_distance: f32) -> Self {
        let enrolled = students
            .iter()
            .filter_map(|s| {
                s.descriptor.as_ref().map(|d| EnrolledFace {
                    student_id: s.id.clone(),
                    descriptor: d.clone(),
                })
            })
            .collect();
        Self {
            enrolled,
            max_distance,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.enrolled.is_empty()
    }

    /// Find the enrolled descriptor with minimum distance to `probe`.
    /// Returns [`MatchOutcome::Unknown`] when the set is empty or the
    /// minimum exceeds the distance ceiling.
    pub fn best_match(&self, probe: &FaceDescriptor) -> MatchOutcome {
        let mut best: Option<(usize, f32)> = None;

        for (i, face) in self.enrolled.iter().enumerate() {
            let dist = probe.distance(&face.descriptor);
            match best {
                Some((_, d)) if dist >= d => {}
                _ => best = Some((i, dist)),
            }
        }

        match best {
            Some((i, dist)) if dist <= self.max_distance => MatchOutcome::Matched {
                student_id: self.enrolled[i].student_id.clone(),
                distance: dist,
            },
            _ => MatchOutcome::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_with(id: &str, descriptor: Option<Vec<f32>>) -> Student {
        Student {
            id: id.into(),
            name: id.into(),
            roll_no: id.into(),
            phone: None,
            face_image: None,
            descriptor: descriptor.map(FaceDescriptor::new),
            last_seen: "Just Enrolled".into(),
            attendance: Vec::new(),
        }
    }

    #[test]
    fn empty_set_is_always_unknown() {
        let matcher = EuclideanMatcher::build(&[], DEFAULT_MAX_DISTANCE);
        let probe = FaceDescriptor::new(vec![0.0; 4]);
        assert_eq!(matcher.best_match(&probe), MatchOutcome::Unknown);
    }

    #[test]
    fn students_without_descriptor_are_excluded() {
        let students = vec![student_with("a", None), student_with("b", None)];
        let matcher = EuclideanMatcher::build(&students, DEFAULT_MAX_DISTANCE);
        assert!(matcher.is_empty());
        let probe = FaceDescriptor::new(vec![0.0; 4]);
        assert_eq!(matcher.best_match(&probe), MatchOutcome::Unknown);
    }

    #[test]
    fn returns_minimum_distance_id() {
        let students = vec![
            student_with("far", Some(vec![1.0, 0.0, 0.0])),
            student_with("near", Some(vec![0.1, 0.0, 0.0])),
            student_with("mid", Some(vec![0.4, 0.0, 0.0])),
        ];
        let matcher = EuclideanMatcher::build(&students, DEFAULT_MAX_DISTANCE);
        let probe = FaceDescriptor::new(vec![0.0, 0.0, 0.0]);
        match matcher.best_match(&probe) {
            MatchOutcome::Matched {
                student_id,
                distance,
            } => {
                assert_eq!(student_id, "near");
                assert!((distance - 0.1).abs() < 1e-6);
            }
            MatchOutcome::Unknown => panic!("expected a match"),
        }
    }

    #[test]
    fn minimum_above_ceiling_is_unknown() {
        let students = vec![student_with("a", Some(vec![1.0, 0.0]))];
        let matcher = EuclideanMatcher::build(&students, 0.55);
        let probe = FaceDescriptor::new(vec![0.0, 0.0]);
        assert_eq!(matcher.best_match(&probe), MatchOutcome::Unknown);
    }

    #[test]
    fn distance_equal_to_ceiling_matches() {
        let students = vec![student_with("a", Some(vec![0.55, 0.0]))];
        let matcher = EuclideanMatcher::build(&students, 0.55);
        let probe = FaceDescriptor::new(vec![0.0, 0.0]);
        assert!(matcher.best_match(&probe).is_match());
    }
}
