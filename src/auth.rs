// ============================================================================
// Security Context - caller credentials carried across service hops
// ============================================================================
//
// Every downstream service authenticates the caller itself, so this service
// never unpacks the token. It only checks that a credential is present and
// hands the whole metadata bag on unchanged. Claims parsing lives here too:
// the identity service sends the subject id as a string and the role as a
// wire enum, both of which must map cleanly into domain types.
//
// ============================================================================

use thiserror::Error;
use tonic::metadata::MetadataMap;
use tonic::Request;

use crate::pb;

/// Metadata key holding the caller credential.
pub const AUTHORIZATION_KEY: &str = "authorization";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("can't parse caller context from request metadata")]
    MissingContext,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("claims subject id {0:?} is not numeric")]
    NonNumericSubject(String),
    #[error("unknown user role value {0}")]
    UnknownRole(i32),
}

/// Inbound request metadata, captured once and reattached to every
/// downstream call so each hop sees the same credentials.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    metadata: MetadataMap,
}

impl SecurityContext {
    /// Captures the caller context from an inbound request.
    ///
    /// A request without a non-empty `authorization` entry carries no usable
    /// caller identity and is rejected before any downstream call is made.
    pub fn from_request<T>(request: &Request<T>) -> Result<Self, AuthError> {
        let metadata = request.metadata();
        match metadata.get(AUTHORIZATION_KEY) {
            Some(credential) if !credential.is_empty() => Ok(Self {
                metadata: metadata.clone(),
            }),
            _ => Err(AuthError::MissingContext),
        }
    }

    /// Builds a downstream request whose metadata is a copy of the whole
    /// inbound bag, not just the credential entry.
    pub fn outgoing<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        *request.metadata_mut() = self.metadata.clone();
        request
    }
}

/// Role of the authenticated caller. Kept closed so a new role added to the
/// wire enum forces every role check to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Customer,
    Supplier,
    Admin,
}

impl From<pb::UserRole> for UserRole {
    fn from(role: pb::UserRole) -> Self {
        match role {
            pb::UserRole::Customer => UserRole::Customer,
            pb::UserRole::Supplier => UserRole::Supplier,
            pb::UserRole::Admin => UserRole::Admin,
        }
    }
}

/// Caller identity as resolved by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserClaims {
    pub account_id: i64,
    pub role: UserRole,
}

impl UserClaims {
    /// Parses wire claims into domain claims.
    ///
    /// The subject id travels as a string and must be numeric; a non-numeric
    /// id or an unknown role value is a malformed payload, never a silent
    /// default.
    pub fn from_wire(claims: pb::UserClaims) -> Result<Self, ClaimsError> {
        let account_id = claims
            .id
            .parse::<i64>()
            .map_err(|_| ClaimsError::NonNumericSubject(claims.id.clone()))?;
        let role = pb::UserRole::try_from(claims.user_role)
            .map(UserRole::from)
            .map_err(|_| ClaimsError::UnknownRole(claims.user_role))?;
        Ok(Self { account_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_authorization(token: &str) -> Request<()> {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert(AUTHORIZATION_KEY, token.parse().unwrap());
        request
    }

    #[test]
    fn test_request_without_metadata_is_rejected() {
        let request = Request::new(());
        let err = SecurityContext::from_request(&request).unwrap_err();
        assert_eq!(err, AuthError::MissingContext);
    }

    #[test]
    fn test_request_with_empty_credential_is_rejected() {
        let request = request_with_authorization("");
        let err = SecurityContext::from_request(&request).unwrap_err();
        assert_eq!(err, AuthError::MissingContext);
    }

    #[test]
    fn test_request_with_credential_is_accepted() {
        let request = request_with_authorization("Bearer abc123");
        let ctx = SecurityContext::from_request(&request).unwrap();
        assert_eq!(
            ctx.outgoing(()).metadata().get(AUTHORIZATION_KEY).unwrap(),
            "Bearer abc123"
        );
    }

    #[test]
    fn test_outgoing_carries_the_whole_metadata_bag() {
        let mut request = request_with_authorization("Bearer abc123");
        request
            .metadata_mut()
            .insert("x-request-id", "req-42".parse().unwrap());

        let ctx = SecurityContext::from_request(&request).unwrap();
        let downstream = ctx.outgoing(());

        assert_eq!(
            downstream.metadata().get(AUTHORIZATION_KEY).unwrap(),
            "Bearer abc123"
        );
        assert_eq!(downstream.metadata().get("x-request-id").unwrap(), "req-42");
    }

    #[test]
    fn test_claims_parse_numeric_subject() {
        let claims = UserClaims::from_wire(pb::UserClaims {
            id: "42".to_string(),
            user_role: pb::UserRole::Supplier as i32,
        })
        .unwrap();
        assert_eq!(claims.account_id, 42);
        assert_eq!(claims.role, UserRole::Supplier);
    }

    #[test]
    fn test_claims_reject_non_numeric_subject() {
        let err = UserClaims::from_wire(pb::UserClaims {
            id: "not-a-number".to_string(),
            user_role: pb::UserRole::Supplier as i32,
        })
        .unwrap_err();
        assert_eq!(err, ClaimsError::NonNumericSubject("not-a-number".into()));
    }

    #[test]
    fn test_claims_reject_unknown_role_value() {
        let err = UserClaims::from_wire(pb::UserClaims {
            id: "42".to_string(),
            user_role: 99,
        })
        .unwrap_err();
        assert_eq!(err, ClaimsError::UnknownRole(99));
    }

    #[test]
    fn test_role_mapping_covers_every_wire_value() {
        assert_eq!(UserRole::from(pb::UserRole::Customer), UserRole::Customer);
        assert_eq!(UserRole::from(pb::UserRole::Supplier), UserRole::Supplier);
        assert_eq!(UserRole::from(pb::UserRole::Admin), UserRole::Admin);
    }
}
