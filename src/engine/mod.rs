pub mod mizan;
pub mod risk;
pub mod session;

pub use mizan::Mizan;
pub use mizan::MizanArgs;
pub use risk::RiskAssessment;
pub use risk::RiskEngine;
pub use session::AnalysisSession;
