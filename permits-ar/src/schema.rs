//! Permits table schema
//!
//! Single source of truth for the expected shape of the permits export:
//! which columns exist, what each parses to, and which are required for a
//! run to proceed.
//!
//! # Usage
//!
//! ```rust
//! use permits_ar::schema::{ColumnType, PermitsSchema};
//! use permits_common::models::PermitField;
//!
//! let schema = PermitsSchema::standard();
//! assert_eq!(schema.column(PermitField::Value).column_type, ColumnType::Decimal);
//! assert!(schema.required_columns().contains(&"issueDate"));
//! ```

use permits_common::models::PermitField;
use permits_common::{Error, Result};

/// Declared type of a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Free text, never fails to parse
    Text,
    /// Floating point number (thousands separators and `$` tolerated)
    Decimal,
    /// Whole number (integral floats such as `2.0` tolerated)
    Integer,
    /// Calendar date in any supported encoding
    Date,
    /// Permit status; unknown statuses are kept verbatim
    Status,
}

/// Column definition with validation constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub field: PermitField,
    pub column_type: ColumnType,
    /// Column must be present in the header row
    pub required: bool,
    /// Negative values are flagged
    pub non_negative: bool,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(field: PermitField, column_type: ColumnType) -> Self {
        Self {
            field,
            column_type,
            required: false,
            non_negative: false,
        }
    }

    /// Mark column as required in the header
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Flag negative values
    pub fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }

    /// Header name
    pub fn name(&self) -> &'static str {
        self.field.column()
    }
}

/// Expected columns of the permits export
#[derive(Debug, Clone, PartialEq)]
pub struct PermitsSchema {
    columns: Vec<ColumnDefinition>,
}

impl PermitsSchema {
    /// The 26-column export layout with the default required set
    pub fn standard() -> Self {
        use ColumnType::*;
        use PermitField as F;

        let columns = vec![
            ColumnDefinition::new(F::PermitNumber, Text).required(),
            ColumnDefinition::new(F::PermitType, Text).required(),
            ColumnDefinition::new(F::WorkType, Text).required(),
            ColumnDefinition::new(F::OccupancyType, Text),
            ColumnDefinition::new(F::Status, Status).required(),
            ColumnDefinition::new(F::Milestone, Text),
            ColumnDefinition::new(F::Value, Decimal).required().non_negative(),
            ColumnDefinition::new(F::TotalFees, Decimal).required().non_negative(),
            ColumnDefinition::new(F::IssueDate, Date).required(),
            ColumnDefinition::new(F::CompleteDate, Date).required(),
            ColumnDefinition::new(F::ApplicantName, Text).required(),
            ColumnDefinition::new(F::FullName, Text),
            ColumnDefinition::new(F::ApplicantAddress1, Text),
            ColumnDefinition::new(F::ApplicantCity, Text),
            ColumnDefinition::new(F::Comments, Text).required(),
            ColumnDefinition::new(F::X, Decimal),
            ColumnDefinition::new(F::Y, Decimal),
            ColumnDefinition::new(F::Longitude, Decimal),
            ColumnDefinition::new(F::Latitude, Decimal),
            ColumnDefinition::new(F::Neighborhood, Text).required(),
            ColumnDefinition::new(F::Ward, Text),
            ColumnDefinition::new(F::DwellingUnitsNew, Integer).non_negative(),
            ColumnDefinition::new(F::DwellingUnitsEliminated, Integer).non_negative(),
            ColumnDefinition::new(F::LicensedUnits, Integer).non_negative(),
            ColumnDefinition::new(F::ShortTermRental, Text),
            ColumnDefinition::new(F::ObjectId, Text),
        ];

        Self { columns }
    }

    /// Standard layout with a replacement required-column list
    ///
    /// Fails if a name is not one of the 26 known headers.
    pub fn with_required(required: &[String]) -> Result<Self> {
        let mut fields = Vec::with_capacity(required.len());
        let mut unknown = Vec::new();
        for name in required {
            match PermitField::from_column(name) {
                Some(field) => fields.push(field),
                None => unknown.push(name.clone()),
            }
        }
        if !unknown.is_empty() {
            return Err(Error::Config(format!(
                "Unknown required column(s): {}",
                unknown.join(", ")
            )));
        }

        let mut schema = Self::standard();
        for column in &mut schema.columns {
            column.required = fields.contains(&column.field);
        }
        Ok(schema)
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Definition of one column
    pub fn column(&self, field: PermitField) -> &ColumnDefinition {
        // Every PermitField has exactly one entry; position matches PermitField::ALL
        let index = PermitField::ALL
            .iter()
            .position(|f| *f == field)
            .unwrap_or_default();
        &self.columns[index]
    }

    /// Header names that must be present
    pub fn required_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.required)
            .map(|c| c.name())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_covers_every_field_in_order() {
        let schema = PermitsSchema::standard();
        assert_eq!(schema.columns().len(), PermitField::ALL.len());
        for (column, field) in schema.columns().iter().zip(PermitField::ALL) {
            assert_eq!(column.field, field);
        }
    }

    #[test]
    fn test_currency_columns_non_negative() {
        let schema = PermitsSchema::standard();
        assert!(schema.column(PermitField::Value).non_negative);
        assert!(schema.column(PermitField::TotalFees).non_negative);
        assert!(!schema.column(PermitField::Longitude).non_negative);
    }

    #[test]
    fn test_with_required_overrides() {
        let schema =
            PermitsSchema::with_required(&["permitNumber".to_string(), "status".to_string()])
                .unwrap();
        assert_eq!(schema.required_columns(), vec!["permitNumber", "status"]);
    }

    #[test]
    fn test_with_required_rejects_unknown_names() {
        let err = PermitsSchema::with_required(&["permit_no".to_string()]).unwrap_err();
        assert!(err.to_string().contains("permit_no"));
    }
}
