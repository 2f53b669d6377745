pub mod in_memory;

pub use in_memory::BlacklistIndex;
pub use in_memory::FlowGraph;
pub use in_memory::ResultCache;
pub use in_memory::SharedBlacklistIndex;
pub use in_memory::SharedFlowGraph;
