//! Type templates and the enrichment matrix

use crate::kb::FactKind;
use vet_common::CheckType;

/// Expected facts per information type. Gaps are the expected kinds not
/// yet confirmed in the knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeTemplate {
    pub check: CheckType,
    pub expected_facts: &'static [FactKind],
}

impl TypeTemplate {
    /// Template for a check type
    pub fn for_check(check: CheckType) -> Self {
        use FactKind::*;
        let expected_facts: &'static [FactKind] = match check {
            CheckType::Identity => &[Name, Dob, Address],
            CheckType::Employment => &[Employer, Address],
            CheckType::Education => &[School],
            CheckType::Criminal => &[County, State],
            CheckType::Civil => &[State],
            CheckType::Financial => &[Address],
            CheckType::Licenses => &[License],
            CheckType::Regulatory => &[],
            CheckType::Sanctions => &[],
            CheckType::AdverseMedia => &[],
            CheckType::DigitalFootprint => &[DiscoveredPerson],
            CheckType::Behavioral => &[],
            CheckType::CorporateRegistry => &[DiscoveredOrg],
        };
        Self {
            check,
            expected_facts,
        }
    }
}

/// One declarative enrichment: confirmed facts of `source` scope
/// queries for `target` via the named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRule {
    pub source: FactKind,
    pub target: CheckType,
    pub param: &'static str,
}

/// The platform enrichment matrix
pub fn enrichment_matrix() -> &'static [EnrichmentRule] {
    use CheckType::*;
    use FactKind::*;
    const MATRIX: &[EnrichmentRule] = &[
        // employment locations scope criminal county searches
        EnrichmentRule {
            source: County,
            target: Criminal,
            param: "county",
        },
        EnrichmentRule {
            source: State,
            target: Criminal,
            param: "state",
        },
        EnrichmentRule {
            source: State,
            target: Civil,
            param: "state",
        },
        EnrichmentRule {
            source: Address,
            target: Criminal,
            param: "address",
        },
        // confirmed employers feed registry and regulatory searches
        EnrichmentRule {
            source: Employer,
            target: CorporateRegistry,
            param: "organization",
        },
        EnrichmentRule {
            source: Employer,
            target: Regulatory,
            param: "organization",
        },
        EnrichmentRule {
            source: DiscoveredOrg,
            target: Sanctions,
            param: "organization",
        },
        EnrichmentRule {
            source: DiscoveredOrg,
            target: CorporateRegistry,
            param: "organization",
        },
        // schools feed education verification
        EnrichmentRule {
            source: School,
            target: Education,
            param: "institution",
        },
        // license registries search by held license
        EnrichmentRule {
            source: License,
            target: Licenses,
            param: "license",
        },
        // aliases and associates widen adverse media coverage
        EnrichmentRule {
            source: DiscoveredPerson,
            target: AdverseMedia,
            param: "associate",
        },
    ];
    MATRIX
}
