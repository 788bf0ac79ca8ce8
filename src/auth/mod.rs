//! Credential providers.
//!
//! The session authenticates with whatever implements
//! [`AccessTokenProvider`]; the mechanics of obtaining and refreshing
//! tokens stay behind that seam.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `provider` | The provider trait and the static long-lived token |
//! | `credentials` | OAuth2 token pair with internal refresh |

// ============================================================================
// Submodules
// ============================================================================

/// The provider trait and static token provider.
pub mod provider;

/// OAuth2 credentials with internal token refresh.
pub mod credentials;

// ============================================================================
// Re-exports
// ============================================================================

pub use credentials::Credentials;
pub use provider::{AccessTokenProvider, LongLivedToken};
