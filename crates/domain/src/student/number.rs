use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StudentError;

/// Student number in the form `yyMMdd-NNNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentNumber(String);

impl StudentNumber {
    /// Generates a number for `date` with a random four digit suffix.
    ///
    /// Callers check the result against numbers already issued and
    /// regenerate on collision.
    pub fn generate(date: NaiveDate) -> Self {
        let suffix = 1000 + (Uuid::new_v4().as_u128() % 9000) as u32;
        Self(format!("{}-{suffix}", date.format("%y%m%d")))
    }

    pub fn parse(raw: &str) -> Result<Self, StudentError> {
        let raw = raw.trim();
        let valid = match raw.split_once('-') {
            Some((date, suffix)) => {
                date.len() == 6
                    && suffix.len() == 4
                    && date.bytes().all(|b| b.is_ascii_digit())
                    && suffix.bytes().all(|b| b.is_ascii_digit())
                    && NaiveDate::parse_from_str(date, "%y%m%d").is_ok()
            }
            None => false,
        };
        if !valid {
            return Err(StudentError::InvalidStudentNumber {
                number: raw.to_string(),
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StudentNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_numbers_are_well_formed() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        for _ in 0..50 {
            let number = StudentNumber::generate(date);
            assert!(number.as_str().starts_with("250901-"));
            let suffix: u32 = number.as_str()[7..].parse().unwrap();
            assert!((1000..=9999).contains(&suffix));
            assert_eq!(StudentNumber::parse(number.as_str()).unwrap(), number);
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        for raw in ["", "250901", "250901-12", "2509011-1234", "251301-1234", "abcdef-1234"] {
            assert!(StudentNumber::parse(raw).is_err(), "{raw} should be rejected");
        }
    }
}
