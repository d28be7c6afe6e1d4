//! The Search-Assess-Refine loop
//!
//! Each information type runs its own iterative cycle: the planner
//! composes queries from subject identifiers, knowledge-base facts, and
//! prior-iteration gaps; the executor fans them out through the gateway
//! under a concurrency bound; the assessor folds results back into the
//! knowledge base and measures confidence and information gain; the
//! iteration controller decides whether to stop or refine.

#![warn(missing_docs)]

pub mod assess;
pub mod cycle;
pub mod kb;
pub mod plan;
pub mod template;

pub use assess::{Assessment, ResultAssessor};
pub use cycle::{CycleFinding, CycleStatus, SarContext, SarCycle, TypeCycleState};
pub use kb::{Fact, FactKind, KnowledgeBase};
pub use plan::{dominant_source, PlanOutcome, PlannedQuery, QueryPlanner};
pub use template::{enrichment_matrix, EnrichmentRule, TypeTemplate};
