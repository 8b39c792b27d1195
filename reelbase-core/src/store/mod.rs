//! Resilient access to the external wide-column store.
//!
//! A logical *table* is a key prefix (`movies:{id}`, `ratings:{user}_{movie}`),
//! a *row* is a hash whose field names carry the column-family prefix
//! (`info:title`, `data:rating`), a *scan* is a cursored `SCAN MATCH` over the
//! table prefix, and a *batched write* is one pipelined round-trip.

pub mod client;
pub mod movies;
pub mod ratings;
pub mod retry;
mod row;

pub use client::StoreClient;
pub use movies::MovieRepository;
pub use ratings::RatingRepository;
pub use retry::RetryPolicy;
