//! Rule table and specificity ordering

use serde::{Deserialize, Serialize};
use vet_common::{
    CheckType, ConsentScope, DataCategory, LocaleSelector, RoleCategory, SourceCategory, Tier,
};

/// Why a demand was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    ConsentMissing,
    LocaleProhibited,
    RoleExcluded,
    TierNotPermitted,
    SourceProhibited,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConsentMissing => "consent_missing",
            Self::LocaleProhibited => "locale_prohibited",
            Self::RoleExcluded => "role_excluded",
            Self::TierNotPermitted => "tier_not_permitted",
            Self::SourceProhibited => "source_prohibited",
        };
        f.write_str(s)
    }
}

/// Restrictions attached to a permitted decision
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Restrictions {
    pub excluded_data_categories: Vec<DataCategory>,
    /// How far back findings may reach, when bounded
    pub lookback_years: Option<u8>,
}

/// One declarative compliance rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub locale: LocaleSelector,
    /// None matches every check type
    pub check: Option<CheckType>,
    /// None matches all roles
    pub role: Option<RoleCategory>,
    /// Empty means all tiers
    #[serde(default)]
    pub applicable_tiers: Vec<Tier>,
    /// None matches every source category
    pub source: Option<SourceCategory>,
    pub permitted: bool,
    pub lookback_years: Option<u8>,
    #[serde(default)]
    pub required_disclosures: Vec<String>,
    #[serde(default)]
    pub excluded_data_categories: Vec<DataCategory>,
    #[serde(default)]
    pub requires_explicit_consent: Option<ConsentScope>,
}

impl ComplianceRule {
    /// Permissive catch-all for a locale selector
    pub fn permit_all(locale: LocaleSelector) -> Self {
        Self {
            locale,
            check: None,
            role: None,
            applicable_tiers: Vec::new(),
            source: None,
            permitted: true,
            lookback_years: None,
            required_disclosures: Vec::new(),
            excluded_data_categories: Vec::new(),
            requires_explicit_consent: None,
        }
    }

    /// Does the rule apply to this decision tuple
    pub fn applies(
        &self,
        locale: &vet_common::Locale,
        role: RoleCategory,
        check: CheckType,
        tier: Tier,
        source: SourceCategory,
    ) -> bool {
        if !self.locale.matches(locale) {
            return false;
        }
        if self.check.is_some_and(|c| c != check) {
            return false;
        }
        if self.role.is_some_and(|r| r != role) {
            return false;
        }
        if !self.applicable_tiers.is_empty() && !self.applicable_tiers.contains(&tier) {
            return false;
        }
        if self.source.is_some_and(|s| s != source) {
            return false;
        }
        true
    }

    /// Resolution order: role binds tighter than locale, locale tighter
    /// than check/source qualifiers.
    pub fn specificity(&self) -> u32 {
        let mut score = self.locale.specificity() as u32 * 4;
        if self.role.is_some() {
            score += 32;
        }
        if self.check.is_some() {
            score += 2;
        }
        if self.source.is_some() {
            score += 1;
        }
        if !self.applicable_tiers.is_empty() {
            score += 1;
        }
        score
    }

    /// Tie-break between equally specific rules: deny beats permit,
    /// then more exclusions, then shorter lookback.
    pub fn restrictiveness(&self) -> (u8, usize, i16) {
        let deny = u8::from(!self.permitted);
        let exclusions = self.excluded_data_categories.len()
            + usize::from(self.requires_explicit_consent.is_some());
        // shorter lookback restricts more; unbounded restricts least
        let lookback = match self.lookback_years {
            Some(y) => 100i16.saturating_sub(y as i16),
            None => 0,
        };
        (deny, exclusions, lookback)
    }
}

/// Versioned snapshot of the active rule table
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub version: u64,
    pub rules: Vec<ComplianceRule>,
}

impl RuleSet {
    /// Build a snapshot with the given version
    pub fn new(version: u64, rules: Vec<ComplianceRule>) -> Self {
        Self { version, rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vet_common::Locale;

    #[test]
    fn test_role_rule_outranks_locale_rule() {
        let role_rule = ComplianceRule {
            role: Some(RoleCategory::Finance),
            ..ComplianceRule::permit_all(LocaleSelector::Any)
        };
        let subdivision_rule =
            ComplianceRule::permit_all(LocaleSelector::Subdivision("US".into(), "CA".into()));
        assert!(role_rule.specificity() > subdivision_rule.specificity());
    }

    #[test]
    fn test_applies_filters_tier() {
        let rule = ComplianceRule {
            applicable_tiers: vec![Tier::Enhanced],
            ..ComplianceRule::permit_all(LocaleSelector::Any)
        };
        let us = Locale::country("US");
        assert!(!rule.applies(
            &us,
            RoleCategory::General,
            CheckType::Criminal,
            Tier::Standard,
            SourceCategory::Court,
        ));
        assert!(rule.applies(
            &us,
            RoleCategory::General,
            CheckType::Criminal,
            Tier::Enhanced,
            SourceCategory::Court,
        ));
    }

    #[test]
    fn test_deny_is_more_restrictive() {
        let permit = ComplianceRule::permit_all(LocaleSelector::Any);
        let deny = ComplianceRule {
            permitted: false,
            ..ComplianceRule::permit_all(LocaleSelector::Any)
        };
        assert!(deny.restrictiveness() > permit.restrictiveness());
    }
}
