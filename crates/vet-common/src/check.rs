//! Check types, tiers, locales, and role vocabulary

use serde::{Deserialize, Serialize};

/// Information types an investigation can run
///
/// Each check type is both a SAR information type and a provider
/// capability key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    Identity,
    Employment,
    Education,
    Criminal,
    Civil,
    Financial,
    Licenses,
    Regulatory,
    /// Sanctions and PEP list screening
    Sanctions,
    AdverseMedia,
    /// OSINT / digital footprint - Enhanced tier only
    DigitalFootprint,
    Behavioral,
    CorporateRegistry,
}

impl CheckType {
    /// Foundation phase types, in strict execution order
    pub const FOUNDATION: [CheckType; 3] = [Self::Identity, Self::Employment, Self::Education];

    /// Records phase types (run in parallel)
    pub const RECORDS: [CheckType; 6] = [
        Self::Criminal,
        Self::Civil,
        Self::Financial,
        Self::Licenses,
        Self::Regulatory,
        Self::Sanctions,
    ];

    /// Intelligence phase types
    pub const INTELLIGENCE: [CheckType; 2] = [Self::AdverseMedia, Self::DigitalFootprint];

    /// Reduced records subset run against related entities
    pub const NETWORK_RECORDS: [CheckType; 3] =
        [Self::Criminal, Self::Sanctions, Self::Regulatory];

    /// True for foundation types (higher SAR threshold and iteration cap)
    pub fn is_foundation(&self) -> bool {
        Self::FOUNDATION.contains(self)
    }

    /// True when this check is only available under the Enhanced tier
    pub fn requires_enhanced(&self) -> bool {
        matches!(self, Self::DigitalFootprint | Self::Behavioral)
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identity => "identity",
            Self::Employment => "employment",
            Self::Education => "education",
            Self::Criminal => "criminal",
            Self::Civil => "civil",
            Self::Financial => "financial",
            Self::Licenses => "licenses",
            Self::Regulatory => "regulatory",
            Self::Sanctions => "sanctions",
            Self::AdverseMedia => "adverse_media",
            Self::DigitalFootprint => "digital_footprint",
            Self::Behavioral => "behavioral",
            Self::CorporateRegistry => "corporate_registry",
        };
        f.write_str(s)
    }
}

/// Investigation depth tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Core sources only
    Standard,
    /// Core + premium sources, human review paths
    Enhanced,
}

/// Provider source class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderClass {
    Core,
    Premium,
}

impl ProviderClass {
    /// Whether a provider of this class may serve a request at `tier`
    pub fn permitted_for(&self, tier: Tier) -> bool {
        match self {
            Self::Core => true,
            Self::Premium => tier == Tier::Enhanced,
        }
    }
}

/// Relationship breadth for network expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degree {
    /// Subject only
    D1,
    /// Direct links
    D2,
    /// Second-degree links
    D3,
}

impl Degree {
    /// Risk dampening applied to findings discovered at this degree
    pub fn dampening(&self) -> f64 {
        match self {
            Self::D1 => 1.0,
            Self::D2 => 0.5,
            Self::D3 => 0.25,
        }
    }
}

/// Monitoring frequency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VigilanceLevel {
    /// One-shot, no recurrence
    V0,
    /// Annual full re-screen
    V1,
    /// Monthly delta checks
    V2,
    /// Bi-monthly delta + real-time sanctions hook
    V3,
}

/// Role category of the subject - drives compliance rules and risk weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCategory {
    General,
    Finance,
    Healthcare,
    Executive,
    Government,
}

/// Category of the data source behind a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Government,
    Court,
    CreditBureau,
    Media,
    Osint,
    Commercial,
    CustomerProvided,
}

/// Data categories a compliance rule can exclude from findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    Political,
    Religious,
    Health,
    Genetic,
    Biometric,
    UnionMembership,
    SexualOrientation,
}

/// Consent scopes a subject can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentScope {
    CreditCheck,
    BehavioralProfile,
    DigitalFootprint,
    PremiumSources,
}

/// Subject jurisdiction: country plus optional subdivision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locale {
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
    /// Subdivision (state, province) code, when known
    pub subdivision: Option<String>,
}

impl Locale {
    /// Country-level locale
    pub fn country(code: impl Into<String>) -> Self {
        Self {
            country: code.into().to_ascii_uppercase(),
            subdivision: None,
        }
    }

    /// Country + subdivision locale
    pub fn subdivision(country: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            country: country.into().to_ascii_uppercase(),
            subdivision: Some(sub.into().to_ascii_uppercase()),
        }
    }

    /// EU membership for region-level rule matching
    pub fn is_eu(&self) -> bool {
        const EU: [&str; 27] = [
            "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE",
            "IT", "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
        ];
        EU.contains(&self.country.as_str())
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subdivision {
            Some(sub) => write!(f, "{}-{}", self.country, sub),
            None => f.write_str(&self.country),
        }
    }
}

/// How a rule or provider capability selects locales
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocaleSelector {
    /// Matches everything (specificity 0)
    Any,
    /// Matches the EU as a block (specificity 1)
    EuRegion,
    /// Matches one country (specificity 2)
    Country(String),
    /// Matches one subdivision (specificity 3)
    Subdivision(String, String),
}

impl LocaleSelector {
    /// Does this selector cover the given locale
    pub fn matches(&self, locale: &Locale) -> bool {
        match self {
            Self::Any => true,
            Self::EuRegion => locale.is_eu(),
            Self::Country(c) => locale.country.eq_ignore_ascii_case(c),
            Self::Subdivision(c, s) => {
                locale.country.eq_ignore_ascii_case(c)
                    && locale
                        .subdivision
                        .as_deref()
                        .is_some_and(|sub| sub.eq_ignore_ascii_case(s))
            }
        }
    }

    /// Narrower selectors win rule resolution ties
    pub fn specificity(&self) -> u8 {
        match self {
            Self::Any => 0,
            Self::EuRegion => 1,
            Self::Country(_) => 2,
            Self::Subdivision(_, _) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_gated_by_tier() {
        assert!(ProviderClass::Core.permitted_for(Tier::Standard));
        assert!(!ProviderClass::Premium.permitted_for(Tier::Standard));
        assert!(ProviderClass::Premium.permitted_for(Tier::Enhanced));
    }

    #[test]
    fn test_locale_selector_specificity() {
        let de = Locale::country("de");
        assert!(LocaleSelector::Any.matches(&de));
        assert!(LocaleSelector::EuRegion.matches(&de));
        assert!(LocaleSelector::Country("DE".into()).matches(&de));
        assert!(!LocaleSelector::Country("FR".into()).matches(&de));

        let us_ca = Locale::subdivision("US", "CA");
        let sel = LocaleSelector::Subdivision("US".into(), "CA".into());
        assert!(sel.matches(&us_ca));
        assert!(sel.specificity() > LocaleSelector::Country("US".into()).specificity());
    }

    #[test]
    fn test_degree_dampening() {
        assert_eq!(Degree::D1.dampening(), 1.0);
        assert_eq!(Degree::D2.dampening(), 0.5);
        assert_eq!(Degree::D3.dampening(), 0.25);
    }
}
