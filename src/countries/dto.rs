use serde::Serialize;

use super::repo_types::{Country, CountryStats};

#[derive(Debug, Serialize)]
pub struct CountryList {
    pub countries: Vec<Country>,
}

#[derive(Debug, Serialize)]
pub struct CountryItem {
    pub country: Country,
}

#[derive(Debug, Serialize)]
pub struct CountryStatsList {
    pub countries: Vec<CountryStats>,
}
