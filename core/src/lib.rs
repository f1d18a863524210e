pub mod clean;
pub mod driver;
pub mod error;
pub mod extract;
pub mod persist;
pub mod prompt;
pub mod retry;
pub mod source;
pub mod store;

pub use driver::{Annotator, Driver, RunStats, RunSummary};
pub use error::{AnnotateError, DriverError, PersistError, RunError};
pub use persist::{JsonFileStore, SnapshotStore};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use store::{AnnotationResult, Item, ResultsStore};
