//! Sign-in callback boundary: an identity token from a sign-in flow goes in,
//! a user id or the fixed rejection marker comes out.

use serde::Serialize;
use tracing::info;

use crate::connectors::IdentityVerifier;
use crate::error::{SyncError, AUTH_REJECTED_MARKER};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SignInOutcome {
    Accepted { user_id: String },
    Rejected { message: &'static str },
}

/// Forwards `id_token` to the verifier. Rejections are not retried; transport
/// failures of the verifier itself are returned as errors.
pub async fn handle_sign_in(
    verifier: &dyn IdentityVerifier,
    id_token: &str,
) -> Result<SignInOutcome, SyncError> {
    match verifier.verify(id_token).await {
        Ok(user_id) => {
            info!(%user_id, "signed in");
            Ok(SignInOutcome::Accepted { user_id })
        }
        Err(SyncError::AuthRejected) => Ok(SignInOutcome::Rejected {
            message: AUTH_REJECTED_MARKER,
        }),
        Err(other) => Err(other),
    }
}
