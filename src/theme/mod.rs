//! Theme platform boundary.
//!
//! | Module   | Responsibility                                          |
//! |----------|---------------------------------------------------------|
//! | `models` | `ThemeSummary` and id normalisation                     |
//! | `cli`    | `ThemeCli` trait, `ShopifyCli`, output parsing          |
//! | `pull`   | `pull_with_retry()`, fixed-interval pull retry loop     |

pub mod cli;
pub mod models;
pub mod pull;

pub use cli::{ShopifyCli, ThemeCli};
pub use models::ThemeSummary;
pub use pull::{RetryPolicy, pull_with_retry};
