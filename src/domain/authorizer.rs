//! Authorization seam. The core ships a permissive default; a real
//! deployment supplies its own policy behind the same trait.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
}

impl AuthorizationStatus {
    pub fn as_ocpp_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Blocked => "Blocked",
            Self::Expired => "Expired",
            Self::Invalid => "Invalid",
        }
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, charge_point_id: &str, id_tag: &str) -> AuthorizationStatus;
}

/// Default policy: accept every idTag. Real authorization is an external
/// collaborator plugged in ahead of the confirmation being emitted.
pub struct AlwaysAccept;

#[async_trait]
impl Authorizer for AlwaysAccept {
    async fn authorize(&self, _charge_point_id: &str, _id_tag: &str) -> AuthorizationStatus {
        AuthorizationStatus::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_accept_accepts_anything() {
        let authorizer = AlwaysAccept;
        let status = authorizer.authorize("CP01", "").await;
        assert_eq!(status, AuthorizationStatus::Accepted);
    }
}
