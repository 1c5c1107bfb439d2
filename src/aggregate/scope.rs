use crate::store::GLOBAL_COUNTRY;

/// Destination filter for Top-N queries, derived from a continent/country pick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// No destination filter.
    All,
    /// Talkgroups whose directory country is `"Global"`.
    Global,
    /// Talkgroups registered for this country key.
    Country(String),
}

impl Scope {
    /// `continent == "Global"` wins over any country; a blank country means no filter.
    pub fn from_selection(continent: Option<&str>, country: Option<&str>) -> Self {
        if continent.map(str::trim) == Some(GLOBAL_COUNTRY) {
            return Scope::Global;
        }
        match country.map(str::trim) {
            Some(country) if !country.is_empty() => Scope::Country(country.to_string()),
            _ => Scope::All,
        }
    }

    /// Directory country whose talkgroups form the filter, if any.
    pub fn directory_country(&self) -> Option<&str> {
        match self {
            Scope::All => None,
            Scope::Global => Some(GLOBAL_COUNTRY),
            Scope::Country(country) => Some(country),
        }
    }
}
