mod eval;
mod plan;
mod reconciler;

pub use plan::MutationPlan;
pub use reconciler::Reconciler;
pub use reconciler::RunSummary;
