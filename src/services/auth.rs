use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::models::Role;

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Actor),
    Unresolved,
}

/// One way of turning request credentials into an actor.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Resolution>;
}

const SESSION_COOKIE: &str = "session";

/// Reads the `session` cookie.
pub struct SessionCookieResolver {
    db: Arc<Mutex<Connection>>,
}

impl SessionCookieResolver {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialResolver for SessionCookieResolver {
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Resolution> {
        match session_cookie(headers) {
            Some(token) => lookup(&self.db, &token),
            None => Ok(Resolution::Unresolved),
        }
    }
}

/// Reads `Authorization: Bearer <token>`.
pub struct BearerTokenResolver {
    db: Arc<Mutex<Connection>>,
}

impl BearerTokenResolver {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialResolver for BearerTokenResolver {
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Resolution> {
        match bearer_token(headers) {
            Some(token) => lookup(&self.db, &token),
            None => Ok(Resolution::Unresolved),
        }
    }
}

fn lookup(db: &Mutex<Connection>, token: &str) -> anyhow::Result<Resolution> {
    let conn = db::lock(db).map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(match queries::find_session_user(&conn, token)? {
        Some((id, role)) => Resolution::Resolved(Actor { id, role }),
        None => Resolution::Unresolved,
    })
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolvers tried in order; the first one that recognises the caller wins.
pub struct CredentialChain {
    resolvers: Vec<Box<dyn CredentialResolver>>,
}

impl CredentialChain {
    pub fn new(resolvers: Vec<Box<dyn CredentialResolver>>) -> Self {
        Self { resolvers }
    }

    /// Cookie sessions first, then bearer tokens, both backed by the sessions table.
    pub fn sessions(db: Arc<Mutex<Connection>>) -> Self {
        Self::new(vec![
            Box::new(SessionCookieResolver::new(Arc::clone(&db))),
            Box::new(BearerTokenResolver::new(db)),
        ])
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Resolution> {
        for resolver in &self.resolvers {
            if let Resolution::Resolved(actor) = resolver.resolve(headers).await? {
                return Ok(Resolution::Resolved(actor));
            }
        }
        Ok(Resolution::Unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    struct Fixed(Resolution);

    #[async_trait]
    impl CredentialResolver for Fixed {
        async fn resolve(&self, _headers: &HeaderMap) -> anyhow::Result<Resolution> {
            Ok(self.0.clone())
        }
    }

    fn actor(id: &str) -> Actor {
        Actor {
            id: id.to_string(),
            role: Role::Client,
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=tok-1; other=x"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("tok-1"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_cookie(&headers), None);
    }

    #[tokio::test]
    async fn test_chain_takes_first_resolved() {
        let chain = CredentialChain::new(vec![
            Box::new(Fixed(Resolution::Unresolved)),
            Box::new(Fixed(Resolution::Resolved(actor("a")))),
            Box::new(Fixed(Resolution::Resolved(actor("b")))),
        ]);
        assert_eq!(
            chain.resolve(&HeaderMap::new()).await.unwrap(),
            Resolution::Resolved(actor("a"))
        );
    }

    #[tokio::test]
    async fn test_empty_chain_is_unresolved() {
        let chain = CredentialChain::new(vec![]);
        assert_eq!(chain.resolve(&HeaderMap::new()).await.unwrap(), Resolution::Unresolved);
    }

    #[tokio::test]
    async fn test_session_chain_against_database() {
        let conn = crate::db::init_db(":memory:").unwrap();
        let user = queries::create_user(&conn, "Cleo", "cleo@example.com", Role::Client).unwrap();
        let session = queries::create_session(&conn, &user.id, 1).unwrap();
        let chain = CredentialChain::sessions(Arc::new(Mutex::new(conn)));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", session.token)).unwrap(),
        );
        assert_eq!(
            chain.resolve(&headers).await.unwrap(),
            Resolution::Resolved(Actor {
                id: user.id.clone(),
                role: Role::Client
            })
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", session.token)).unwrap(),
        );
        assert!(matches!(chain.resolve(&headers).await.unwrap(), Resolution::Resolved(_)));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer bogus"));
        assert_eq!(chain.resolve(&headers).await.unwrap(), Resolution::Unresolved);
    }
}
