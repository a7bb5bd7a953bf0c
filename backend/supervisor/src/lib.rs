pub mod credentials;
pub mod error;
pub mod store;
pub mod supervisor;
pub mod watchdog;

pub use credentials::FileCredentialStore;
pub use error::StoreError;
pub use store::{FileTaskStore, TaskSnapshots, TaskStore};
pub use supervisor::{RestoreReport, Submission, Supervisor};
pub use watchdog::Watchdog;
