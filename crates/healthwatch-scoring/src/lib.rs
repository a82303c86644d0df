pub mod auditor;
pub mod scorer;

pub use auditor::audit;
pub use scorer::{score, ScoringInputs};
