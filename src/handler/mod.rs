pub mod blacklist;
pub mod shutdown;

pub use blacklist::BlacklistFeedHandler;
pub use blacklist::BlacklistFeedOperator;
pub use blacklist::BlacklistHandler;
pub use shutdown::ShutdownSignal;
