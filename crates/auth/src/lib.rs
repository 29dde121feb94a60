//! `tallyerp-auth`: bearer-token validation.
//!
//! Tokens are minted elsewhere; this crate only verifies them and exposes who
//! the caller is. It knows nothing about HTTP.

pub mod claims;
pub mod validator;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use validator::{Hs256JwtValidator, JwtValidator, TokenError};
