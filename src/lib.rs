//! Agora - client for an anonymous-but-accountable governance Exchange.
//!
//! The device enrolls a self-sovereign identity behind a proof-of-work
//! challenge, signs every privileged request with a key it never discloses,
//! mints and spends single-use anonymous voting stamps, and keeps draft
//! polls local until they are asserted (promoted) to the remote Exchange.
//!
//! Key principles:
//! - the Exchange owns poll lifecycle and tallying; this crate owns the
//!   client-side identity, signing, credential and sync logic
//! - a consumed stamp is never reused
//! - nothing local is purged until its remote counterpart is confirmed live
//! - presentation is an external collaborator driving [`session::Session`]

pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod polls;
pub mod session;
pub mod signing;
pub mod stamps;
pub mod store;
pub mod sync;
pub mod vote;
