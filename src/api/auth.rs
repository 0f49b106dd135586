//! Caller identity from the `x-user-id` / `x-user-role` headers set by the
//! upstream gateway.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::{AppError, AuthorizationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::security::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller plus the request id used to tag errors.
#[derive(Debug, Clone)]
pub struct Caller {
    pub actor: Actor,
    pub request_id: Option<String>,
}

impl Caller {
    /// Attach this request's id to an error.
    pub fn tag(&self, error: AppError) -> AppError {
        match &self.request_id {
            Some(id) => error.with_request_id(id.clone()),
            None => error,
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AuthorizationError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| AuthorizationError::Unauthenticated {
            reason: format!("missing {} header", name),
        })?
        .to_str()
        .map_err(|_| AuthorizationError::Unauthenticated {
            reason: format!("{} header is not valid text", name),
        })
}

fn actor_from_parts(parts: &Parts) -> Result<Actor, AuthorizationError> {
    let user_id = Uuid::parse_str(header(parts, USER_ID_HEADER)?.trim()).map_err(|_| {
        AuthorizationError::Unauthenticated {
            reason: format!("{} must be a UUID", USER_ID_HEADER),
        }
    })?;
    let role: Role = header(parts, USER_ROLE_HEADER)?.parse()?;
    Ok(Actor::new(user_id, role))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = get_request_id_from_headers(&parts.headers);
        match actor_from_parts(parts) {
            Ok(actor) => Ok(Caller { actor, request_id }),
            Err(e) => {
                let error = AppError::from(e);
                Err(match request_id {
                    Some(id) => error.with_request_id(id),
                    None => error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/refunds");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn extracts_actor_from_headers() {
        let id = Uuid::new_v4();
        let mut parts = parts(&[
            (USER_ID_HEADER, &id.to_string()),
            (USER_ROLE_HEADER, "admin"),
            ("x-request-id", "req-1"),
        ]);
        let caller = Caller::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(caller.actor.user_id, id);
        assert!(caller.actor.is_admin());
        assert_eq!(caller.request_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn missing_or_bad_headers_are_unauthenticated() {
        let mut missing = parts(&[(USER_ROLE_HEADER, "client")]);
        let err = Caller::from_request_parts(&mut missing, &()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);

        let mut bad_id = parts(&[(USER_ID_HEADER, "nope"), (USER_ROLE_HEADER, "client")]);
        assert!(Caller::from_request_parts(&mut bad_id, &()).await.is_err());

        let id = Uuid::new_v4().to_string();
        let mut bad_role = parts(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "root")]);
        assert!(Caller::from_request_parts(&mut bad_role, &()).await.is_err());
    }
}
