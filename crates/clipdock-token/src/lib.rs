//! Clipdock Token - Single-use, expiring token lifecycles
//!
//! One mechanism, three consumers: invite redemption, email verification
//! and password reset. All tokens are random byte strings stored only as
//! a one-way digest, redeemable at most once and only before expiry.
//!
//! # Redemption guarantees
//!
//! ```text
//! invite:  find ──► check unused/unexpired ──► mark used   (one entry lock)
//!                                                  │
//!                                                  ▼
//!                                          membership upsert
//!
//! action:  conditional remove(purpose, unexpired) ──► subject
//!          (single atomic find-and-delete)
//! ```
//!
//! Concurrent redemption of the same token yields exactly one success;
//! every loser observes a terminal error, never a second membership.

pub mod action;
pub mod invite;
pub mod material;

pub use action::{ActionConfig, ActionToken, ActionTokenLedger, TokenPurpose};
pub use invite::{Invite, InviteConfig, InviteLedger, InviteService};
pub use material::{generate_token, hash_token, TOKEN_BYTES};
