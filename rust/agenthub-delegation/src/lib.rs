#![warn(missing_docs)]

//! Checks on stored delegation chains, and the scopes HTTP routes require of
//! delegated callers.
//!
//! A delegation chain is the ordered list of hops a token passed through on
//! its way from the root delegation to the caller. Every hop must delegate a
//! subset of what the hop before it held, unless that parent held `"*"`.
//!
//! ```rust
//! use agenthub_delegation::{DelegationHop, required_scope_for_route, verify_scope_attenuation};
//!
//! let chain = [
//!     DelegationHop::new("tok-root", ["read"]),
//!     DelegationHop::new("tok-child", ["read", "write"]),
//! ];
//! let violation = verify_scope_attenuation(&chain).unwrap();
//! assert_eq!(violation.hop_index, 1);
//! assert_eq!(violation.excess_scopes, ["write"]);
//!
//! assert_eq!(required_scope_for_route("GET", "/v1/agents/x"), Some("read"));
//! ```

mod chain;
mod route;

pub use chain::*;
pub use route::*;
