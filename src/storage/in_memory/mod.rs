pub mod blacklist;
pub mod cache;
pub mod graph;

pub use blacklist::BlacklistIndex;
pub use blacklist::SharedBlacklistIndex;
pub use cache::ResultCache;
pub use graph::FlowGraph;
pub use graph::SharedFlowGraph;
