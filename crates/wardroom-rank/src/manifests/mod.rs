//! Built-in route manifests, one per rank.
//!
//! Each manifest lists its own allowlist in full. Nothing is inherited from
//! the rank below; a route a higher rank should keep must be repeated.

mod admiral;
mod captain;
mod commodore;
mod crew;

pub use admiral::ADMIRAL;
pub use captain::CAPTAIN;
pub use commodore::COMMODORE;
pub use crew::CREW;
