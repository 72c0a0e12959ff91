//! Wire types for the QR-request endpoints

use serde::{Deserialize, Serialize};

pub use guest_auth::{LoginUser as AuthUser, UserRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBrief {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A guest QR-code request as listed by the backend.
///
/// The `novus_*` identifiers and `qr_number` are filled in by the access
/// control system once a superuser approves the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrRequest {
    pub id: String,
    pub guest_name: String,
    pub guest_surname: String,
    pub guest_email: String,
    #[serde(default)]
    pub guest_phone: String,
    #[serde(default)]
    pub remark: String,
    pub status: QrRequestStatus,
    #[serde(default)]
    pub rejection_reason: String,
    pub manager: UserBrief,
    pub approved_by: Option<UserBrief>,
    pub approved_at: Option<String>,
    pub novus_user_id: Option<String>,
    pub novus_card_id: Option<String>,
    pub novus_credential_id: Option<String>,
    pub qr_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Manager's submission for a new guest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QrRequestCreate {
    pub guest_name: String,
    pub guest_surname: String,
    pub guest_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

/// Create response. `manager` is the manager's id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrRequestCreated {
    pub id: String,
    pub guest_name: String,
    pub guest_surname: String,
    pub guest_email: String,
    #[serde(default)]
    pub guest_phone: String,
    #[serde(default)]
    pub remark: String,
    pub status: QrRequestStatus,
    pub manager: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectPayload<'a> {
    pub rejection_reason: &'a str,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}
