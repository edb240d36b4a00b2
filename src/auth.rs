//! Actor identity forwarded by the authenticating gateway.
//!
//! Every mutating service call takes an explicit [`Actor`]; the guard
//! functions here decide what each kind of actor may do.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_TYPE_HEADER: &str = "x-actor-type";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StaffRole {
    Admin,
    Dispatcher,
    Courier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Actor {
    Staff { id: Uuid, role: StaffRole },
    Customer { id: Uuid },
}

impl Actor {
    pub fn staff(id: Uuid, role: StaffRole) -> Self {
        Actor::Staff { id, role }
    }

    pub fn customer(id: Uuid) -> Self {
        Actor::Customer { id }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Actor::Staff { id, .. } | Actor::Customer { id } => *id,
        }
    }

    /// Label stored in audit rows
    pub fn kind(&self) -> &'static str {
        match self {
            Actor::Staff { .. } => "staff",
            Actor::Customer { .. } => "customer",
        }
    }

    fn role(&self) -> Option<StaffRole> {
        match self {
            Actor::Staff { role, .. } => Some(*role),
            Actor::Customer { .. } => None,
        }
    }
}

/// Any staff member.
pub fn ensure_staff(actor: &Actor) -> Result<(), ServiceError> {
    match actor {
        Actor::Staff { .. } => Ok(()),
        Actor::Customer { id } => {
            warn!(actor_id = %id, "customer attempted a staff-only operation");
            Err(ServiceError::Forbidden(
                "Only staff may perform this operation".to_string(),
            ))
        }
    }
}

/// Creating, editing and assigning carriers is limited to admins and dispatchers.
pub fn ensure_can_manage_orders(actor: &Actor) -> Result<(), ServiceError> {
    ensure_staff(actor)?;
    match actor.role() {
        Some(StaffRole::Admin) | Some(StaffRole::Dispatcher) => Ok(()),
        _ => Err(ServiceError::Forbidden(
            "Only admins and dispatchers may manage delivery orders".to_string(),
        )),
    }
}

/// Couriers collect cash on delivery, so every staff role may record payments.
pub fn ensure_can_record_payment(actor: &Actor) -> Result<(), ServiceError> {
    ensure_staff(actor)
}

/// Customers may only read their own orders.
pub fn ensure_can_view_order(
    actor: &Actor,
    order_party_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    match actor {
        Actor::Staff { .. } => Ok(()),
        Actor::Customer { id } if order_party_id == Some(*id) => Ok(()),
        Actor::Customer { .. } => Err(ServiceError::Forbidden(
            "Order does not belong to this customer".to_string(),
        )),
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)
            .ok_or_else(|| ServiceError::Unauthorized("Missing actor identity".to_string()))?;
        let id = Uuid::parse_str(id)
            .map_err(|_| ServiceError::Unauthorized("Invalid actor identity".to_string()))?;

        match header(parts, ACTOR_TYPE_HEADER).map(str::to_ascii_lowercase).as_deref() {
            Some("customer") => Ok(Actor::Customer { id }),
            Some("staff") => {
                let role = header(parts, ACTOR_ROLE_HEADER)
                    .and_then(|r| r.parse::<StaffRole>().ok())
                    .ok_or_else(|| {
                        ServiceError::Unauthorized("Missing or unknown staff role".to_string())
                    })?;
                Ok(Actor::Staff { id, role })
            }
            _ => Err(ServiceError::Unauthorized(
                "Missing or unknown actor type".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<Actor, ServiceError> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_staff_with_role() {
        let id = Uuid::new_v4();
        let actor = extract(&[
            (ACTOR_ID_HEADER, &id.to_string()),
            (ACTOR_TYPE_HEADER, "staff"),
            (ACTOR_ROLE_HEADER, "Courier"),
        ])
        .await
        .unwrap();
        assert_eq!(actor, Actor::staff(id, StaffRole::Courier));
    }

    #[tokio::test]
    async fn missing_headers_are_unauthorized() {
        assert_matches!(extract(&[]).await, Err(ServiceError::Unauthorized(_)));
        let id = Uuid::new_v4().to_string();
        assert_matches!(
            extract(&[(ACTOR_ID_HEADER, &id), (ACTOR_TYPE_HEADER, "staff")]).await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn customer_sees_only_own_orders() {
        let me = Uuid::new_v4();
        let actor = Actor::customer(me);
        assert!(ensure_can_view_order(&actor, Some(me)).is_ok());
        assert_matches!(
            ensure_can_view_order(&actor, Some(Uuid::new_v4())),
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(ensure_staff(&actor), Err(ServiceError::Forbidden(_)));
    }

    #[test]
    fn couriers_cannot_manage_orders() {
        let courier = Actor::staff(Uuid::new_v4(), StaffRole::Courier);
        assert!(ensure_can_record_payment(&courier).is_ok());
        assert_matches!(
            ensure_can_manage_orders(&courier),
            Err(ServiceError::Forbidden(_))
        );
    }
}
