pub mod decision;
pub mod dispatcher;
pub mod priority;
pub mod topic;

pub use decision::{DecisionConfig, DecisionMaker, Evaluation, EvaluationState};
pub use dispatcher::{DispatchReport, Dispatcher, ParticipantOutcome};
pub use priority::{priority, role_weight, sort_by_priority, PriorityWeights};
