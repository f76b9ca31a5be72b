use crate::error::{Rejection, Result};
use crate::models::{AuthInfo, Principal, User, Video};
use crate::storage::DiscoveryStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Visibility/authorization gate shared by every ranking operation.
pub struct AuthGate<S> {
    store: Arc<S>,
}

impl<S: DiscoveryStore> AuthGate<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve the caller.
    ///
    /// Every identifier present in the token must match exactly one stored
    /// user, and all of them the same one. A token with no identifiers, an
    /// unknown or ambiguous identifier, or identifiers pointing at different
    /// users is rejected with [`Rejection::AuthInvalid`].
    pub async fn authorize(&self, auth: &AuthInfo) -> Result<Principal> {
        let credentials = auth.credentials();
        if credentials.is_empty() {
            debug!("Auth rejected: token carries no identifiers");
            return Err(Rejection::AuthInvalid.into());
        }

        let mut resolved: Option<User> = None;
        for credential in credentials {
            let kind = credential.kind();
            let mut users = self.store.find_users_by_credential(credential).await?;
            if users.len() != 1 {
                debug!(credential = kind, matches = users.len(), "Auth rejected");
                return Err(Rejection::AuthInvalid.into());
            }
            let user = users.remove(0);
            match &resolved {
                Some(previous) if previous.mid != user.mid => {
                    debug!(
                        credential = kind,
                        "Auth rejected: identifiers resolve to different users"
                    );
                    return Err(Rejection::AuthInvalid.into());
                }
                Some(_) => {}
                None => resolved = Some(user),
            }
        }

        resolved
            .as_ref()
            .map(Principal::from)
            .ok_or_else(|| Rejection::AuthInvalid.into())
    }
}

/// A video is visible when it is public, or the viewer owns it, or the
/// viewer is a superuser.
pub fn is_visible(video: &Video, viewer: &Principal, now: DateTime<Utc>) -> bool {
    viewer.is_superuser() || video.owner_mid == viewer.mid || video.is_public_at(now)
}
