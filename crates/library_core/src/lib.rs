pub mod domain;
pub mod ledger;
pub mod ports;

pub use domain::{
    AssetKind, Book, BookChanges, BookDownloads, BookId, BookUsageReport, LibraryTotals, Message,
    MessageId, MessageListing, NewBook, NewMessage, NewUser, Role, UsageEntry, UsageEvent,
    UsageEventId, UsageKind, User, UserCredentials, UserId, UserUpdate,
};
pub use ledger::{placeholder_name, UsageLedger};
pub use ports::{AssetStorage, DatabaseService, PortError, PortResult};
