pub mod address;
pub mod analysis;
pub mod blacklist;
pub mod graph;
pub mod risk;
pub mod transaction;

pub use address::Address;
pub use analysis::AnalysisOptions;
pub use analysis::AnalysisResult;
pub use analysis::AnalysisStats;
pub use blacklist::BlacklistEntry;
pub use blacklist::BlacklistUpdate;
pub use graph::Direction;
pub use graph::GraphEdge;
pub use graph::GraphNode;
pub use graph::GraphSnapshot;
pub use graph::Neighbor;
pub use graph::Subgraph;
pub use risk::FactorKind;
pub use risk::NodeScore;
pub use risk::RiskFactor;
pub use risk::RiskLevel;
pub use transaction::ParsedRecord;
pub use transaction::Transaction;
