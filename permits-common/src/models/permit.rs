//! Permit record model
//!
//! Column names in [`PermitField::column`] are the wire contract with the
//! source export; renaming one breaks schema validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One column of the permits export
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitField {
    PermitNumber,
    PermitType,
    WorkType,
    OccupancyType,
    Status,
    Milestone,
    Value,
    TotalFees,
    IssueDate,
    CompleteDate,
    ApplicantName,
    FullName,
    ApplicantAddress1,
    ApplicantCity,
    Comments,
    X,
    Y,
    Longitude,
    Latitude,
    Neighborhood,
    Ward,
    DwellingUnitsNew,
    DwellingUnitsEliminated,
    LicensedUnits,
    ShortTermRental,
    ObjectId,
}

impl PermitField {
    /// All 26 source columns in export order
    pub const ALL: [PermitField; 26] = [
        PermitField::PermitNumber,
        PermitField::PermitType,
        PermitField::WorkType,
        PermitField::OccupancyType,
        PermitField::Status,
        PermitField::Milestone,
        PermitField::Value,
        PermitField::TotalFees,
        PermitField::IssueDate,
        PermitField::CompleteDate,
        PermitField::ApplicantName,
        PermitField::FullName,
        PermitField::ApplicantAddress1,
        PermitField::ApplicantCity,
        PermitField::Comments,
        PermitField::X,
        PermitField::Y,
        PermitField::Longitude,
        PermitField::Latitude,
        PermitField::Neighborhood,
        PermitField::Ward,
        PermitField::DwellingUnitsNew,
        PermitField::DwellingUnitsEliminated,
        PermitField::LicensedUnits,
        PermitField::ShortTermRental,
        PermitField::ObjectId,
    ];

    /// Header name in the source CSV
    pub fn column(self) -> &'static str {
        match self {
            PermitField::PermitNumber => "permitNumber",
            PermitField::PermitType => "permitType",
            PermitField::WorkType => "workType",
            PermitField::OccupancyType => "occupancyType",
            PermitField::Status => "status",
            PermitField::Milestone => "milestone",
            PermitField::Value => "value",
            PermitField::TotalFees => "totalFees",
            PermitField::IssueDate => "issueDate",
            PermitField::CompleteDate => "completeDate",
            PermitField::ApplicantName => "applicantName",
            PermitField::FullName => "fullName",
            PermitField::ApplicantAddress1 => "applicantAddress1",
            PermitField::ApplicantCity => "applicantCity",
            PermitField::Comments => "comments",
            PermitField::X => "X",
            PermitField::Y => "Y",
            PermitField::Longitude => "Longitude",
            PermitField::Latitude => "Latitude",
            PermitField::Neighborhood => "Neighborhoods_Desc",
            PermitField::Ward => "Wards",
            PermitField::DwellingUnitsNew => "dwellingUnitsNew",
            PermitField::DwellingUnitsEliminated => "dwellingUnitsEliminated",
            PermitField::LicensedUnits => "licensedUnits",
            PermitField::ShortTermRental => "shortTermRental",
            PermitField::ObjectId => "OBJECTID",
        }
    }

    /// Look up a field by its source header name (exact match)
    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.column() == column)
    }
}

impl fmt::Display for PermitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Permit lifecycle status as reported by the city
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermitStatus {
    Closed,
    Issued,
    Open,
    InProcess,
    Cancelled,
    Withdrawn,
    StopWork,
    Void,
    /// Any status not in the list above, kept verbatim
    Other(String),
}

impl PermitStatus {
    /// Parse a raw status cell (case-insensitive)
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "closed" => PermitStatus::Closed,
            "issued" => PermitStatus::Issued,
            "open" => PermitStatus::Open,
            "in process" => PermitStatus::InProcess,
            "cancelled" | "canceled" => PermitStatus::Cancelled,
            "withdrawn" => PermitStatus::Withdrawn,
            "stop work" => PermitStatus::StopWork,
            "void" => PermitStatus::Void,
            _ => PermitStatus::Other(raw.trim().to_string()),
        }
    }

    /// Display label (matches the export spelling)
    pub fn as_str(&self) -> &str {
        match self {
            PermitStatus::Closed => "Closed",
            PermitStatus::Issued => "Issued",
            PermitStatus::Open => "Open",
            PermitStatus::InProcess => "In Process",
            PermitStatus::Cancelled => "Cancelled",
            PermitStatus::Withdrawn => "Withdrawn",
            PermitStatus::StopWork => "Stop Work",
            PermitStatus::Void => "Void",
            PermitStatus::Other(raw) => raw,
        }
    }

    /// Coarse lifecycle class used by completion and abandonment rates
    pub fn class(&self) -> StatusClass {
        match self {
            PermitStatus::Closed => StatusClass::Completed,
            PermitStatus::Issued | PermitStatus::Open | PermitStatus::InProcess => {
                StatusClass::Active
            }
            PermitStatus::Cancelled
            | PermitStatus::Withdrawn
            | PermitStatus::StopWork
            | PermitStatus::Void => StatusClass::Abandoned,
            PermitStatus::Other(_) => StatusClass::Other,
        }
    }
}

impl fmt::Display for PermitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle class of a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// Closed
    Completed,
    /// Issued, Open, In Process
    Active,
    /// Cancelled, Withdrawn, Stop Work, Void
    Abandoned,
    Other,
}

impl StatusClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusClass::Completed => "completed",
            StatusClass::Active => "active",
            StatusClass::Abandoned => "abandoned",
            StatusClass::Other => "other",
        }
    }
}

/// One row of the permits export
///
/// Values that failed to parse are stored as `None` and the field is listed
/// in `flagged`; values that parsed but are out of range (negative currency,
/// completion before issue) are kept as-is and also flagged. Consumers decide
/// whether a flagged field disqualifies the row for a given metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermitRecord {
    /// 1-based data row number in the source file (header excluded)
    pub row_number: usize,
    pub permit_number: String,
    pub permit_type: Option<String>,
    pub work_type: Option<String>,
    pub occupancy_type: Option<String>,
    pub status: Option<PermitStatus>,
    pub milestone: Option<String>,
    pub value: Option<f64>,
    pub total_fees: Option<f64>,
    pub issue_date: Option<NaiveDate>,
    pub complete_date: Option<NaiveDate>,
    pub applicant_name: Option<String>,
    pub full_name: Option<String>,
    pub applicant_address1: Option<String>,
    pub applicant_city: Option<String>,
    pub comments: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub neighborhood: Option<String>,
    pub ward: Option<String>,
    pub dwelling_units_new: Option<i64>,
    pub dwelling_units_eliminated: Option<i64>,
    pub licensed_units: Option<i64>,
    pub short_term_rental: Option<String>,
    pub object_id: Option<String>,
    /// Fields that failed a type or range check
    pub flagged: BTreeSet<PermitField>,
}

impl PermitRecord {
    /// Whether `field` failed validation for this row
    pub fn is_flagged(&self, field: PermitField) -> bool {
        self.flagged.contains(&field)
    }

    /// Numeric view of a field, if the field is numeric and present
    pub fn numeric(&self, field: PermitField) -> Option<f64> {
        match field {
            PermitField::Value => self.value,
            PermitField::TotalFees => self.total_fees,
            PermitField::X => self.x,
            PermitField::Y => self.y,
            PermitField::Longitude => self.longitude,
            PermitField::Latitude => self.latitude,
            PermitField::DwellingUnitsNew => self.dwelling_units_new.map(|v| v as f64),
            PermitField::DwellingUnitsEliminated => {
                self.dwelling_units_eliminated.map(|v| v as f64)
            }
            PermitField::LicensedUnits => self.licensed_units.map(|v| v as f64),
            _ => None,
        }
    }

    /// Text view of a field, if present
    pub fn text(&self, field: PermitField) -> Option<&str> {
        let value = match field {
            PermitField::PermitNumber => Some(&self.permit_number),
            PermitField::PermitType => self.permit_type.as_ref(),
            PermitField::WorkType => self.work_type.as_ref(),
            PermitField::OccupancyType => self.occupancy_type.as_ref(),
            PermitField::Status => return self.status.as_ref().map(|s| s.as_str()),
            PermitField::Milestone => self.milestone.as_ref(),
            PermitField::ApplicantName => self.applicant_name.as_ref(),
            PermitField::FullName => self.full_name.as_ref(),
            PermitField::ApplicantAddress1 => self.applicant_address1.as_ref(),
            PermitField::ApplicantCity => self.applicant_city.as_ref(),
            PermitField::Comments => self.comments.as_ref(),
            PermitField::Neighborhood => self.neighborhood.as_ref(),
            PermitField::Ward => self.ward.as_ref(),
            PermitField::ShortTermRental => self.short_term_rental.as_ref(),
            PermitField::ObjectId => self.object_id.as_ref(),
            _ => None,
        };
        value.map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_columns_unique_and_round_trip() {
        let columns: BTreeSet<&str> = PermitField::ALL.iter().map(|f| f.column()).collect();
        assert_eq!(columns.len(), 26);

        for field in PermitField::ALL {
            assert_eq!(PermitField::from_column(field.column()), Some(field));
        }
        assert_eq!(PermitField::from_column("neighborhood"), None);
    }

    #[test]
    fn test_status_parse_and_class() {
        assert_eq!(PermitStatus::from_raw("closed"), PermitStatus::Closed);
        assert_eq!(PermitStatus::from_raw(" Stop Work "), PermitStatus::StopWork);
        assert_eq!(PermitStatus::from_raw("Canceled"), PermitStatus::Cancelled);
        assert_eq!(
            PermitStatus::from_raw("Expired"),
            PermitStatus::Other("Expired".to_string())
        );

        assert_eq!(PermitStatus::Closed.class(), StatusClass::Completed);
        assert_eq!(PermitStatus::InProcess.class(), StatusClass::Active);
        assert_eq!(PermitStatus::Void.class(), StatusClass::Abandoned);
        assert_eq!(PermitStatus::Other("x".into()).class(), StatusClass::Other);
    }

    #[test]
    fn test_numeric_and_text_views() {
        let record = PermitRecord {
            permit_number: "P-1".to_string(),
            value: Some(1500.0),
            dwelling_units_new: Some(2),
            status: Some(PermitStatus::Issued),
            neighborhood: Some("Whittier".to_string()),
            ..Default::default()
        };

        assert_eq!(record.numeric(PermitField::Value), Some(1500.0));
        assert_eq!(record.numeric(PermitField::DwellingUnitsNew), Some(2.0));
        assert_eq!(record.numeric(PermitField::Comments), None);
        assert_eq!(record.text(PermitField::Status), Some("Issued"));
        assert_eq!(record.text(PermitField::Neighborhood), Some("Whittier"));
        assert_eq!(record.text(PermitField::Comments), None);
    }
}
