//! Bearer-token authentication.
//!
//! Tokens look like `lk_<prefix>_<secret>`. Only the SHA-256 digest of the
//! secret is stored; lookups go through the prefix and the digest is
//! compared in constant time.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    ApiTokensRepo, CreateApiTokenParams, CreateUserParams, RepoError, UsersRepo,
};
use crate::domain::entities::UserRecord;

const TOKEN_PREFIX: &str = "lk";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum TokenIssueError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("invalid token request: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("invalid bearer token")]
    Invalid,
    #[error("revoked bearer token")]
    Revoked,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    tokens: Arc<dyn ApiTokensRepo>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>, tokens: Arc<dyn ApiTokensRepo>) -> Self {
        Self { users, tokens }
    }

    /// Issues a fresh token for `email`, creating the user on first use.
    pub async fn issue_token(&self, email: &str, name: &str) -> Result<IssuedToken, TokenIssueError> {
        let email = normalize_email(email)
            .ok_or_else(|| TokenIssueError::Validation(format!("`{email}` is not an email")))?;

        let user = match self.users.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(TokenIssueError::Validation(
                        "a name is required for new users".into(),
                    ));
                }
                self.users
                    .create_user(CreateUserParams {
                        email,
                        name: name.to_string(),
                    })
                    .await?
            }
        };

        let prefix = Self::generate_prefix();
        let secret = Self::generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");

        self.tokens
            .create_token(CreateApiTokenParams {
                user_id: user.id,
                prefix,
                hashed_secret: Self::hash_secret(&secret),
            })
            .await?;

        Ok(IssuedToken { user, token })
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let parsed = Self::parse_token(token).ok_or(AuthError::Invalid)?;
        let record = self
            .tokens
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)?;

        if let Some(revoked_at) = record.revoked_at
            && revoked_at <= OffsetDateTime::now_utc()
        {
            return Err(AuthError::Revoked);
        }

        let hashed_input = Self::hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }

        let user = self
            .users
            .find_user(record.user_id)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)?;

        Ok(Principal {
            user_id: user.id,
            email: user.email,
            name: user.name,
        })
    }

    fn hash_secret(secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }

    fn generate_prefix() -> String {
        Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    fn generate_secret() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    fn parse_token(token: &str) -> Option<ParsedToken> {
        let mut parts = token.trim().splitn(3, '_');
        if parts.next()? != TOKEN_PREFIX {
            return None;
        }
        let prefix = parts.next()?;
        let secret = parts.next()?;
        if secret.len() < MIN_SECRET_LEN || prefix.is_empty() {
            return None;
        }
        Some(ParsedToken {
            prefix: prefix.to_string(),
            secret: secret.to_string(),
        })
    }
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    (!local.is_empty() && domain.contains('.') && !domain.starts_with('.')).then_some(email)
}
