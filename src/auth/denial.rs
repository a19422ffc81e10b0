//! Authorization denials reported to the session host

use crate::auth::permissions::ResourceKind;
use thiserror::Error;

/// Code sent to the client when a request is authorized
pub const OK_CODE: u8 = 0;

/// Why a request was refused.
///
/// Every variant except [`Denial::ProtocolViolation`] is meant for the
/// client; its [`code`](Denial::code) lets the front end show a reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("unauthorized access: token invalid for user '{user}'")]
    InvalidCredential { user: String },

    #[error("unauthorized access: user '{user}' can't connect to broker '{broker}'")]
    BrokerNotAllowed { user: String, broker: String },

    #[error("unauthorized access: user '{user}' can't publish to topic '{topic}'")]
    PublishNotAllowed { user: String, topic: String },

    #[error("unauthorized access: user '{user}' can't subscribe to '{filter}'")]
    SubscribeNotAllowed { user: String, filter: String },

    #[error("authorizations for user '{user}' are not available")]
    Unavailable { user: String },

    #[error("internal error: {0}")]
    ProtocolViolation(String),
}

impl Denial {
    /// The denial for a resource missing from a user's permissions
    pub fn not_allowed(kind: ResourceKind, user: &str, resource: &str) -> Self {
        let user = user.to_string();
        let resource = resource.to_string();
        match kind {
            ResourceKind::Broker => Denial::BrokerNotAllowed {
                user,
                broker: resource,
            },
            ResourceKind::Publish => Denial::PublishNotAllowed {
                user,
                topic: resource,
            },
            ResourceKind::Subscribe => Denial::SubscribeNotAllowed {
                user,
                filter: resource,
            },
        }
    }

    /// Numeric code for the client's reporting layer
    pub fn code(&self) -> u8 {
        match self {
            Denial::InvalidCredential { .. } => 1,
            Denial::BrokerNotAllowed { .. } => 2,
            Denial::PublishNotAllowed { .. } => 3,
            Denial::SubscribeNotAllowed { .. } => 4,
            Denial::Unavailable { .. } => 5,
            Denial::ProtocolViolation(_) => 6,
        }
    }

    /// Internal errors are logged, not shown to the end user
    pub fn is_internal(&self) -> bool {
        matches!(self, Denial::ProtocolViolation(_))
    }
}
