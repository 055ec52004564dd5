//! Telegram adapter (teloxide).
//!
//! Decodes Telegram updates into `tally_core::messaging::Incoming`, hands them
//! to `ExpenseBot`, and sends the resulting reply back to the originating chat.

pub mod handlers;
pub mod router;
