//! Cumulative grade point average.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::CourseGrade;

/// Highest CGPA on the 4.0 scale, in hundredths.
const MAX_HUNDREDTHS: u16 = 400;

/// CGPA on a 4.0 scale, held exactly to two decimal places.
///
/// Serialized as a JSON number such as `3.43`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cgpa(u16);

impl Cgpa {
    pub const ZERO: Cgpa = Cgpa(0);

    /// Builds a CGPA from hundredths, clamped to 4.00.
    pub fn from_hundredths(hundredths: u16) -> Self {
        Self(hundredths.min(MAX_HUNDREDTHS))
    }

    /// Credit-weighted average over countable grades, rounded half-up.
    ///
    /// W, I and P grades are left out of both sums. Zero when nothing is
    /// countable.
    pub fn from_grades<'a>(grades: impl IntoIterator<Item = &'a CourseGrade>) -> Self {
        let (weighted, credits) = grades
            .into_iter()
            .filter_map(|g| g.grade.points_tenths().map(|p| (p, g.credits)))
            .fold((0u64, 0u64), |(weighted, credits), (points, c)| {
                (weighted + u64::from(points) * u64::from(c), credits + u64::from(c))
            });

        if credits == 0 {
            return Self::ZERO;
        }
        // weighted is in tenths; scale to hundredths then round half-up.
        let hundredths = (weighted * 20 + credits) / (credits * 2);
        Self::from_hundredths(u16::try_from(hundredths).unwrap_or(MAX_HUNDREDTHS))
    }

    pub fn hundredths(self) -> u16 {
        self.0
    }

    pub fn value(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    pub fn is_good_standing(self) -> bool {
        self.0 >= 200
    }

    pub fn is_dean_list(self) -> bool {
        self.0 >= 350
    }

    pub fn is_probation(self) -> bool {
        (100..200).contains(&self.0)
    }

    pub fn is_dismissal(self) -> bool {
        self.0 < 100
    }
}

impl std::fmt::Display for Cgpa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Cgpa {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for Cgpa {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !(0.0..=4.0).contains(&value) {
            return Err(serde::de::Error::custom(format!(
                "CGPA must be between 0 and 4.0, got {value}"
            )));
        }
        Ok(Self::from_hundredths((value * 100.0).round() as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::Grade;
    use chrono::Utc;
    use common::AggregateId;

    fn graded(grade: Grade, credits: u32) -> CourseGrade {
        CourseGrade {
            course_id: AggregateId::new(),
            credits,
            grade,
            semester: "Fall".into(),
            academic_year: 2025,
            is_final: true,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn weights_by_credits() {
        // (4.0 * 3 + 3.0 * 4) / 7 = 3.428..
        let grades = [graded(Grade::A, 3), graded(Grade::B, 4)];
        assert_eq!(Cgpa::from_grades(&grades).to_string(), "3.43");
    }

    #[test]
    fn rounds_half_up() {
        // (3.5 * 1 + 3.0 * 1 + 3.0 * 2) / 4 = 3.125
        let grades = [
            graded(Grade::BPlus, 1),
            graded(Grade::B, 1),
            graded(Grade::B, 2),
        ];
        assert_eq!(Cgpa::from_grades(&grades).hundredths(), 313);
    }

    #[test]
    fn ignores_uncountable_grades() {
        let grades = [
            graded(Grade::C, 3),
            graded(Grade::W, 3),
            graded(Grade::P, 4),
            graded(Grade::I, 2),
        ];
        assert_eq!(Cgpa::from_grades(&grades).hundredths(), 200);

        let only_withdrawn = [graded(Grade::W, 3)];
        assert_eq!(Cgpa::from_grades(&only_withdrawn), Cgpa::ZERO);
    }

    #[test]
    fn standing_bands() {
        let cgpa = |h| Cgpa::from_hundredths(h);
        assert!(cgpa(99).is_dismissal());
        assert!(cgpa(100).is_probation());
        assert!(cgpa(199).is_probation());
        assert!(cgpa(200).is_good_standing());
        assert!(!cgpa(349).is_dean_list());
        assert!(cgpa(350).is_dean_list());
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&Cgpa::from_hundredths(343)).unwrap();
        assert_eq!(json, "3.43");

        let back: Cgpa = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hundredths(), 343);
        assert!(serde_json::from_str::<Cgpa>("4.5").is_err());
    }
}
