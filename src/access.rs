/// Per-project access control
///
/// The policy is a strategy object held by the application context. Handlers
/// extract a [`Caller`] and ask it to authorize an operation before touching
/// the storage backend.
use crate::{
    context::AppContext,
    error::{IndexError, IndexResult},
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Method},
};
use std::{convert::Infallible, fmt};
use tracing::warn;

/// Kind of access being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Write => write!(f, "write"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Input to an access decision
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub operation: Operation,
    /// `None` for index-wide operations such as listing all projects
    pub project: Option<&'a str>,
    pub method: &'a Method,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
}

/// Decides whether a request may perform an operation on a project
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn is_allowed(&self, request: &AccessRequest<'_>) -> bool;
}

/// Grants every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AccessPolicy for AllowAll {
    async fn is_allowed(&self, _request: &AccessRequest<'_>) -> bool {
        true
    }
}

/// Request details needed for access decisions
#[derive(Debug, Clone)]
pub struct Caller {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            headers: parts.headers.clone(),
        })
    }
}

impl Caller {
    /// Fail with `Forbidden` unless the configured policy allows the operation
    pub async fn authorize(
        &self,
        ctx: &AppContext,
        operation: Operation,
        project: Option<&str>,
    ) -> IndexResult<()> {
        let request = AccessRequest {
            operation,
            project,
            method: &self.method,
            path: &self.path,
            headers: &self.headers,
        };

        if ctx.access_policy.is_allowed(&request).await {
            return Ok(());
        }

        warn!(
            "Access denied: {} on project {} ({} {})",
            operation,
            project.unwrap_or("(index)"),
            self.method,
            self.path
        );

        Err(IndexError::Forbidden(format!(
            "You do not have permission to perform {} on project {}.",
            operation,
            project.unwrap_or("(index)")
        )))
    }
}
