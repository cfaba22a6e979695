//! Google API collaborators: OAuth token refresh, Calendar booking, and
//! Sheets append. All calls are plain REST through `reqwest`; credentials
//! come from the `google` config section.

pub mod auth;
pub mod calendar;
pub mod sheets;

pub use auth::{GoogleAuthError, OauthTokenProvider};
pub use calendar::CalendarScheduler;
pub use sheets::{SheetsClient, SheetsError};
