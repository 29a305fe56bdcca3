//! Trust Card Vote
//!
//! Page controller for voting on Trust Card claims: loads the claim list,
//! runs upvotes, downvotes and claim creation through the
//! [`trustcard_protocols::StakeOrchestrator`], and keeps the inline error
//! and toast notifications the page renders.

pub mod config;
pub mod error;
pub mod notify;
pub mod page;

pub use config::VoteConfig;
pub use error::{Error, Result};
pub use notify::{Notification, NotificationKind, Notifications};
pub use page::{PageView, PendingSubject, VotePage};
