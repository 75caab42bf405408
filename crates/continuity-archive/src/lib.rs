pub mod error;
pub mod store;
pub mod types;

pub use error::{ArchiveError, Result};
pub use store::{date_of, Archiver};
pub use types::{ArchivedMessage, ArchiveStats, DayFile, Sender};
