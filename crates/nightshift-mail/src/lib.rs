//! Mail layer: sends generated plans through an HTTP mail relay.

pub mod relay;

pub use relay::{MailClient, MailError, OutboundMail};
