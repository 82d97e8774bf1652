//! The two denormalization layouts and the four canned operations on each.

mod company;
mod person;

use crate::config::{CollectionsConfig, QueriesConfig};
use crate::errors::BenchError;
use crate::generate::Generator;
use crate::model;
use crate::query::Operation;
use mongodb::bson::Document;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One document per person, company embedded by value.
    PersonCentric,
    /// One document per company with an embedded employee array.
    CompanyCentric,
}

impl Layout {
    pub const ALL: [Self; 2] = [Self::PersonCentric, Self::CompanyCentric];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PersonCentric => "person-centric (company embedded in each person)",
            Self::CompanyCentric => "company-centric (employees embedded in each company)",
        }
    }

    #[must_use]
    pub fn collection(self, cols: &CollectionsConfig) -> &str {
        match self {
            Self::PersonCentric => &cols.person_centric,
            Self::CompanyCentric => &cols.company_centric,
        }
    }

    /// Generate this layout's documents.
    ///
    /// # Errors
    /// Returns an error if a record fails to serialize.
    pub fn documents<R: Rng>(self, generator: &mut Generator<R>) -> Result<Vec<Document>, BenchError> {
        match self {
            Self::PersonCentric => model::to_documents(&generator.person_centric()),
            Self::CompanyCentric => model::to_documents(&generator.company_centric()),
        }
    }

    #[must_use]
    pub fn operation(self, kind: QueryKind, q: &QueriesConfig) -> Operation {
        match self {
            Self::PersonCentric => person::operation(kind, q),
            Self::CompanyCentric => company::operation(kind, q),
        }
    }
}

impl std::str::FromStr for Layout {
    type Err = BenchError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "person" | "person-centric" | "person_centric" => Ok(Self::PersonCentric),
            "company" | "company-centric" | "company_centric" => Ok(Self::CompanyCentric),
            other => Err(BenchError::Config(format!("unknown layout: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Q1: full name and company name of every person.
    FullNames,
    /// Q2: number of employees per company.
    EmployeeCounts,
    /// Q3: set a fixed age for everyone born before the threshold year.
    AgeUpdate,
    /// Q4: append the suffix to every company name.
    CompanyRename,
}

impl QueryKind {
    pub const ALL: [Self; 4] = [Self::FullNames, Self::EmployeeCounts, Self::AgeUpdate, Self::CompanyRename];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FullNames => "Q1",
            Self::EmployeeCounts => "Q2",
            Self::AgeUpdate => "Q3",
            Self::CompanyRename => "Q4",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::FullNames => "full name and company of every person",
            Self::EmployeeCounts => "employee count per company",
            Self::AgeUpdate => "fixed age for persons born before the threshold",
            Self::CompanyRename => "append suffix to company names",
        }
    }
}
