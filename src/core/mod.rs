pub mod comparator;
pub mod engine;
pub mod filter;
pub mod fingerprint;
pub mod index;
pub mod listing;
pub mod paths;
pub mod scanner;
pub mod transfer;

pub use comparator::{compare_trees, DiffResult};
pub use engine::{SyncEngine, SyncReport};
pub use filter::ExcludeFilter;
pub use index::FileIndex;
pub use listing::RemoteLister;
pub use scanner::FileScanner;
pub use transfer::{TransferExecutor, TransferPhase, TransferProgress};
