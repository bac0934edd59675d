//! The closed, versioned field schema of the Modelo 100 form.
//!
//! Every field the system can ever write is a variant of [`Field`]. Sections
//! and fields are listed in the order the review surface shows them and the
//! renderer prints them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bumped whenever a field is added, removed or renamed.
pub const SCHEMA_VERSION: u32 = 1;

/// A group of fields on the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Identification,
    Income,
    Deductions,
}

impl Section {
    pub fn all() -> [Section; 3] {
        [Section::Identification, Section::Income, Section::Deductions]
    }

    /// Heading printed above the section
    pub fn title(&self) -> &'static str {
        match self {
            Section::Identification => "Datos Personales",
            Section::Income => "Ingresos",
            Section::Deductions => "Deducciones",
        }
    }

    /// Fields of this section, in print order
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Section::Identification => &[
                Field::Identification,
                Field::FirstName,
                Field::LastName,
                Field::Address,
                Field::PostalCode,
                Field::City,
                Field::Province,
            ],
            Section::Income => &[
                Field::EmploymentIncome,
                Field::SelfEmploymentIncome,
                Field::CapitalGains,
                Field::OtherIncome,
            ],
            Section::Deductions => &[
                Field::HousingDeduction,
                Field::PensionContributions,
                Field::CharitableDonations,
                Field::OtherDeductions,
            ],
        }
    }
}

/// A single named field on the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Identification,
    FirstName,
    LastName,
    Address,
    PostalCode,
    City,
    Province,
    EmploymentIncome,
    SelfEmploymentIncome,
    CapitalGains,
    OtherIncome,
    HousingDeduction,
    PensionContributions,
    CharitableDonations,
    OtherDeductions,
}

impl Field {
    /// Every field in schema order (section by section)
    pub fn all() -> impl Iterator<Item = Field> {
        Section::all().into_iter().flat_map(|s| s.fields().iter().copied())
    }

    /// Persisted name of the field
    pub fn name(&self) -> &'static str {
        match self {
            Field::Identification => "identification",
            Field::FirstName => "firstName",
            Field::LastName => "lastName",
            Field::Address => "address",
            Field::PostalCode => "postalCode",
            Field::City => "city",
            Field::Province => "province",
            Field::EmploymentIncome => "employmentIncome",
            Field::SelfEmploymentIncome => "selfEmploymentIncome",
            Field::CapitalGains => "capitalGains",
            Field::OtherIncome => "otherIncome",
            Field::HousingDeduction => "housingDeduction",
            Field::PensionContributions => "pensionContributions",
            Field::CharitableDonations => "charitableDonations",
            Field::OtherDeductions => "otherDeductions",
        }
    }

    /// Look up a field by its persisted name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Field::all().find(|f| f.name() == name)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::Identification => "DNI/NIE",
            Field::FirstName => "Nombre",
            Field::LastName => "Apellidos",
            Field::Address => "Dirección",
            Field::PostalCode => "Código Postal",
            Field::City => "Ciudad",
            Field::Province => "Provincia",
            Field::EmploymentIncome => "Rendimientos del trabajo",
            Field::SelfEmploymentIncome => "Actividades económicas",
            Field::CapitalGains => "Ganancias patrimoniales",
            Field::OtherIncome => "Otros ingresos",
            Field::HousingDeduction => "Deducción vivienda",
            Field::PensionContributions => "Aportaciones a planes de pensiones",
            Field::CharitableDonations => "Donativos",
            Field::OtherDeductions => "Otras deducciones",
        }
    }

    pub fn section(&self) -> Section {
        Section::all()
            .into_iter()
            .find(|s| s.fields().contains(self))
            .unwrap_or(Section::Identification)
    }

    /// Income and deduction amounts (in euros) are numeric on the review surface
    pub fn is_amount(&self) -> bool {
        self.section() != Section::Identification
    }

    /// Check a review-surface value for this field. Empty input is always
    /// accepted since it means "unset".
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || !self.is_amount() {
            return true;
        }
        value.replace(',', ".").parse::<f64>().map_or(false, |n| n.is_finite())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for field in Field::all() {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("favouriteColour"), None);
    }

    #[test]
    fn test_schema_order() {
        let fields: Vec<Field> = Field::all().collect();
        assert_eq!(fields.len(), 15);
        assert_eq!(fields[0], Field::Identification);
        assert_eq!(fields[7], Field::EmploymentIncome);
        assert_eq!(fields[14], Field::OtherDeductions);
    }

    #[test]
    fn test_serde_uses_persisted_names() {
        let json = serde_json::to_string(&Field::PensionContributions).unwrap();
        assert_eq!(json, "\"pensionContributions\"");
    }

    #[test]
    fn test_amount_validation() {
        assert!(Field::EmploymentIncome.accepts("25000"));
        assert!(Field::EmploymentIncome.accepts("1234,56"));
        assert!(Field::EmploymentIncome.accepts(""));
        assert!(!Field::EmploymentIncome.accepts("mucho"));
        assert!(Field::City.accepts("Sevilla"));
    }
}
