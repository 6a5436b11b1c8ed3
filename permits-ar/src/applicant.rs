//! Applicant type heuristic
//!
//! Splits applicants into contractors and property owners by business
//! keywords in the name. Names are compared lowercased but never merged or
//! rewritten: "CENTERPOINT ENERGY" and "CenterPoint Energy Resource Corp"
//! remain two applicants.

use std::fmt;

/// Name fragments that mark a business applicant
pub const BUSINESS_KEYWORDS: [&str; 9] = [
    "llc",
    "inc",
    "corp",
    "company",
    "heating",
    "plumbing",
    "electric",
    "construction",
    "builders",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApplicantType {
    Contractor,
    PropertyOwner,
}

impl ApplicantType {
    /// Classify an applicant name
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        if BUSINESS_KEYWORDS.iter().any(|k| lower.contains(k)) {
            ApplicantType::Contractor
        } else {
            ApplicantType::PropertyOwner
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicantType::Contractor => "Contractor",
            ApplicantType::PropertyOwner => "Property Owner",
        }
    }
}

impl fmt::Display for ApplicantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_names_are_contractors() {
        assert_eq!(ApplicantType::classify("Acme Plumbing LLC"), ApplicantType::Contractor);
        assert_eq!(ApplicantType::classify("CENTERPOINT ENERGY RESOURCE CORP"), ApplicantType::Contractor);
        assert_eq!(ApplicantType::classify("Northside Builders"), ApplicantType::Contractor);
    }

    #[test]
    fn test_personal_names_are_owners() {
        assert_eq!(ApplicantType::classify("Jane Smith"), ApplicantType::PropertyOwner);
        assert_eq!(ApplicantType::PropertyOwner.to_string(), "Property Owner");
    }
}
