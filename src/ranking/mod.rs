// src/ranking/mod.rs

pub mod counter;
pub mod page;
pub mod sort_key;

pub use counter::{CounterStrategy, CounterTarget, RetryPolicy};
pub use page::{Page, PageRequest, page_number_of};
pub use sort_key::SortKey;
