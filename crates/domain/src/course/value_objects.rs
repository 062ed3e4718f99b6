//! Value objects for the course catalog.

use serde::{Deserialize, Serialize};

use super::CourseError;

/// Longest accepted course code after trimming.
const MAX_CODE_LEN: usize = 20;

/// Normalized course code: trimmed, upper-cased, non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseCode(String);

impl CourseCode {
    /// Normalizes and validates a raw code such as `" cs101 "`.
    pub fn parse(raw: &str) -> Result<Self, CourseError> {
        let code = raw.trim().to_uppercase();
        if code.is_empty()
            || code.len() > MAX_CODE_LEN
            || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(CourseError::InvalidCourseCode {
                code: raw.to_string(),
            });
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CourseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Term in which a course is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Semester {
    #[default]
    Fall,
    Spring,
    Summer,
    Winter,
}

impl Semester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::Fall => "Fall",
            Semester::Spring => "Spring",
            Semester::Summer => "Summer",
            Semester::Winter => "Winter",
        }
    }
}

impl std::fmt::Display for Semester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Semester {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fall" => Ok(Semester::Fall),
            "spring" => Ok(Semester::Spring),
            "summer" => Ok(Semester::Summer),
            "winter" => Ok(Semester::Winter),
            _ => Err(CourseError::InvalidSemester {
                semester: s.to_string(),
            }),
        }
    }
}
