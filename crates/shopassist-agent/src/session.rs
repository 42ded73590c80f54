//! Session resolution.
//!
//! Maps the ambient context of a chat request to a typed session identity.
//! Admin and customer identities are derived deterministically so a returning
//! caller lands in the same conversation; anonymous visitors carry their own
//! identifier and get a fresh one when they have none.

use crate::error::AgentError;
use crate::Result;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use shopassist_core::{NewConversation, SessionType};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ANON_SUFFIX_LEN: usize = 7;

/// What the transport knows about the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Store domain the request is scoped to.
    pub shop: Option<String>,

    /// The caller authenticated as the store owner.
    pub is_admin: bool,

    /// Logged-in shopper id supplied by the storefront.
    pub customer_id: Option<String>,

    /// Identifier the client kept from an earlier anonymous session.
    pub client_session_id: Option<String>,
}

/// A typed session identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSession {
    pub session_id: String,
    pub session_type: SessionType,
    pub store_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

impl ResolvedSession {
    /// Fields needed to open this session's conversation.
    pub fn new_conversation(&self) -> NewConversation {
        NewConversation {
            store_id: self.store_id.clone(),
            session_id: self.session_id.clone(),
            session_type: self.session_type,
            customer_id: self.customer_id.clone(),
        }
    }
}

impl RequestContext {
    /// Resolve the session for a chat turn, minting an anonymous id if the
    /// client has none.
    pub fn resolve(&self) -> Result<ResolvedSession> {
        self.resolve_with(|| Some(generate_anonymous_id()))?
            .ok_or_else(|| AgentError::validation("Unable to resolve session"))
    }

    /// Resolve the session of a caller who may already have one. An
    /// anonymous caller without an identifier has no session.
    pub fn resolve_existing(&self) -> Result<Option<ResolvedSession>> {
        self.resolve_with(|| None)
    }

    fn resolve_with(
        &self,
        mint_anonymous: impl FnOnce() -> Option<String>,
    ) -> Result<Option<ResolvedSession>> {
        let store_id = non_blank(self.shop.as_deref())
            .ok_or_else(|| AgentError::validation("Missing shop parameter"))?
            .to_string();

        if self.is_admin {
            return Ok(Some(ResolvedSession {
                session_id: format!("admin-{}", store_id),
                session_type: SessionType::Admin,
                store_id,
                customer_id: None,
            }));
        }

        if let Some(customer_id) = non_blank(self.customer_id.as_deref()) {
            return Ok(Some(ResolvedSession {
                session_id: format!("customer-{}", customer_id),
                session_type: SessionType::Customer,
                customer_id: Some(customer_id.to_string()),
                store_id,
            }));
        }

        let session_id = match non_blank(self.client_session_id.as_deref()) {
            Some(id) => Some(id.to_string()),
            None => mint_anonymous(),
        };

        Ok(session_id.map(|session_id| ResolvedSession {
            session_id,
            session_type: SessionType::Anonymous,
            store_id,
            customer_id: None,
        }))
    }
}

/// A fresh anonymous session id: `anon-<unix millis>-<7 base36 chars>`.
pub fn generate_anonymous_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ANON_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("anon-{}-{}", Utc::now().timestamp_millis(), suffix)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
