//! Collision-free, category-prefixed registration IDs.
//!
//! `regid` hands out short identifiers such as `DGK-004` to participants of an
//! event registration. Writers are independent and uncoordinated; the only
//! shared point is an [`AllocationStore`] offering an atomic
//! create-if-absent. The [`Allocator`] rescans the store on every attempt,
//! proposes the next free sequence number and lets the conditional create
//! break ties, retrying with backoff on conflict.

mod allocator;
mod category;
mod error;
mod export;
mod generator;
mod id;
mod notify;
mod participant;
mod sleep_provider;
mod store;
#[cfg(test)]
mod testing;
mod time;
mod writer;

pub use crate::allocator::*;
pub use crate::category::*;
pub use crate::error::*;
pub use crate::export::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::notify::*;
pub use crate::participant::*;
pub use crate::sleep_provider::*;
pub use crate::store::*;
pub use crate::time::*;
pub use crate::writer::*;
