//! Session issuer for resumable reel uploads.
//!
//! Authenticates the caller, derives a unique storage object key and
//! returns the parameters the client needs to upload. Stateless: nothing
//! is written anywhere.

pub mod error;
pub mod handler;
pub mod identity;
pub mod object_key;
pub mod session;

pub use error::IssuerError;
pub use handler::{IssuerState, router};
pub use identity::{AuthApiResolver, CallerIdentity, IdentityError, IdentityResolver};
pub use object_key::{file_extension, object_name, resumable_endpoint};
pub use session::issue_upload_session;
