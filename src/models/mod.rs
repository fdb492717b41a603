// src/models/mod.rs

pub mod board;
pub mod comment;
pub mod post;
pub mod timestamps;
pub mod user;

pub use timestamps::Timestamps;
