pub mod api;
pub mod config;
pub mod error;
pub mod reveal;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_support;
