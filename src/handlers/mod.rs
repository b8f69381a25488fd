//! HTTP handlers in two tiers: `public` needs no token, `protected` runs
//! behind the bearer-token middleware and per-route role gates.

pub mod protected;
pub mod public;
