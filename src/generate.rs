//! Synthetic persons and companies.

use crate::config::DataConfig;
use crate::model::{CompanyRecord, CompanyRef, Person, PersonRecord};
use fake::Fake;
use fake::faker::company::en::CompanyName;
use fake::faker::name::en::{FirstName, LastName};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

pub struct Generator<R: Rng> {
    rng: R,
    data: DataConfig,
}

impl Generator<StdRng> {
    /// Seeded from `data.seed` when present, otherwise from the thread RNG.
    #[must_use]
    pub fn from_config(data: &DataConfig) -> Self {
        let rng = match data.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self::with_rng(rng, data.clone())
    }
}

impl<R: Rng> Generator<R> {
    pub const fn with_rng(rng: R, data: DataConfig) -> Self {
        Self { rng, data }
    }

    pub fn person(&mut self) -> Person {
        let first: String = FirstName().fake_with_rng(&mut self.rng);
        let last: String = LastName().fake_with_rng(&mut self.rng);
        let birth_year = self.rng.random_range(self.data.birth_year_min..=self.data.birth_year_max);
        Person::new(first, last, birth_year, self.data.reference_year)
    }

    /// `n` distinct company names. Repeats from the faker get a numeric suffix.
    pub fn company_names(&mut self, n: usize) -> Vec<String> {
        let mut seen = HashSet::with_capacity(n);
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let base: String = CompanyName().fake_with_rng(&mut self.rng);
            let mut name = base.clone();
            let mut k = 2usize;
            while seen.contains(&name) {
                name = format!("{base} {k}");
                k += 1;
            }
            seen.insert(name.clone());
            out.push(name);
        }
        out
    }

    fn employees(&mut self) -> Vec<Person> {
        (0..self.data.num_persons_per_company).map(|_| self.person()).collect()
    }

    /// One record per person, each carrying its company by value.
    pub fn person_centric(&mut self) -> Vec<PersonRecord> {
        let names = self.company_names(self.data.num_companies);
        let mut out = Vec::with_capacity(self.data.total_persons());
        for name in names {
            let company = CompanyRef { name };
            for person in self.employees() {
                out.push(PersonRecord { person, company: company.clone() });
            }
        }
        out
    }

    /// One record per company with its full employee list.
    pub fn company_centric(&mut self) -> Vec<CompanyRecord> {
        self.company_names(self.data.num_companies)
            .into_iter()
            .map(|name| CompanyRecord { name, employees: self.employees() })
            .collect()
    }
}
