//! Letter grades and recorded course grades.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use super::StudentError;

/// Letter grade on a 4.0 scale.
///
/// W (withdrawn), I (incomplete) and P (pass) carry no grade points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
    F,
    W,
    I,
    P,
}

impl Grade {
    /// Grade points in tenths (A is 40), or `None` for W, I and P.
    pub fn points_tenths(self) -> Option<u32> {
        match self {
            Grade::A => Some(40),
            Grade::BPlus => Some(35),
            Grade::B => Some(30),
            Grade::CPlus => Some(25),
            Grade::C => Some(20),
            Grade::D => Some(10),
            Grade::F => Some(0),
            Grade::W | Grade::I | Grade::P => None,
        }
    }

    pub fn points(self) -> Option<f64> {
        self.points_tenths().map(|tenths| f64::from(tenths) / 10.0)
    }

    /// Counted in GPA numerator and denominator.
    pub fn is_countable(self) -> bool {
        self.points_tenths().is_some()
    }

    pub fn is_passing(self) -> bool {
        matches!(
            self,
            Grade::A | Grade::BPlus | Grade::B | Grade::CPlus | Grade::C | Grade::D | Grade::P
        )
    }

    pub fn counts_toward_completed(self) -> bool {
        !matches!(self, Grade::F | Grade::W | Grade::I)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
            Grade::W => "W",
            Grade::I => "I",
            Grade::P => "P",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Grade {
    type Err = StudentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B+" => Ok(Grade::BPlus),
            "B" => Ok(Grade::B),
            "C+" => Ok(Grade::CPlus),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            "W" => Ok(Grade::W),
            "I" => Ok(Grade::I),
            "P" => Ok(Grade::P),
            _ => Err(StudentError::InvalidGrade {
                grade: s.to_string(),
            }),
        }
    }
}

/// A grade recorded on a student's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseGrade {
    pub course_id: AggregateId,
    pub credits: u32,
    pub grade: Grade,
    pub semester: String,
    pub academic_year: i32,
    pub is_final: bool,
    pub recorded_at: DateTime<Utc>,
}

impl CourseGrade {
    /// True if this grade is for `course_id` in the given term.
    pub fn is_for(&self, course_id: AggregateId, semester: &str, academic_year: i32) -> bool {
        self.course_id == course_id && self.semester == semester && self.academic_year == academic_year
    }

    pub fn in_term(&self, semester: &str, academic_year: i32) -> bool {
        self.semester == semester && self.academic_year == academic_year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdrawn_incomplete_and_pass_carry_no_points() {
        for grade in [Grade::W, Grade::I, Grade::P] {
            assert!(!grade.is_countable());
            assert_eq!(grade.points(), None);
        }
        assert_eq!(Grade::BPlus.points(), Some(3.5));
        assert_eq!(Grade::F.points(), Some(0.0));
    }

    #[test]
    fn pass_is_passing_but_fail_is_not() {
        assert!(Grade::P.is_passing());
        assert!(Grade::D.is_passing());
        assert!(!Grade::F.is_passing());
        assert!(!Grade::W.is_passing());
    }

    #[test]
    fn completed_credits_exclude_fail_withdrawn_incomplete() {
        assert!(Grade::P.counts_toward_completed());
        assert!(Grade::D.counts_toward_completed());
        assert!(!Grade::F.counts_toward_completed());
        assert!(!Grade::W.counts_toward_completed());
        assert!(!Grade::I.counts_toward_completed());
    }

    #[test]
    fn parses_and_serializes_with_plus_signs() {
        assert_eq!("b+".parse::<Grade>().unwrap(), Grade::BPlus);
        assert!("E".parse::<Grade>().is_err());
        assert_eq!(serde_json::to_string(&Grade::CPlus).unwrap(), "\"C+\"");
    }
}
