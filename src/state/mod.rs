//! Work item state definitions
//!
//! This module defines the status machine that every URL in the work store
//! moves through during a crawl.

mod item_state;

pub use item_state::ItemState;
