pub mod datasource;
pub mod ingest;

pub use datasource::Cursor;
pub use datasource::FeedPage;
pub use datasource::TransactionFeed;
pub use ingest::RetryPolicy;
pub use ingest::TransactionIngestor;
pub use ingest::TransactionStream;
