//! QR-request endpoints
//!
//! Manager endpoints: create, list own, delete. Superuser endpoints: list all,
//! list pending, approve, reject. Both roles can download the QR code of an
//! approved request. Role enforcement is the backend's job; a forbidden call
//! comes back as `Error::Api { status: 403, .. }`.

use std::sync::Arc;

use bytes::Bytes;
use guest_gateway::{ApiRequest, ApiResponse, Gateway};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Paginated, QrRequest, QrRequestCreate, QrRequestCreated, RejectPayload};

const QR_REQUESTS_PATH: &str = "/api/qr-requests/";

/// Client for `/api/qr-requests/`.
#[derive(Clone)]
pub struct QrClient {
    gateway: Arc<Gateway>,
}

impl QrClient {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(&self, payload: &QrRequestCreate) -> Result<QrRequestCreated> {
        let body = serde_json::to_value(payload)
            .map_err(|e| Error::Decode(format!("serializing create payload: {e}")))?;
        let created: QrRequestCreated = self
            .fetch(ApiRequest::post(QR_REQUESTS_PATH).json(body))
            .await?;
        info!(id = %created.id, "created QR request");
        Ok(created)
    }

    /// The caller's own requests (manager).
    pub async fn my_requests(&self, page: u32) -> Result<Paginated<QrRequest>> {
        self.list("my/", page).await
    }

    /// Every request (superuser).
    pub async fn all_requests(&self, page: u32) -> Result<Paginated<QrRequest>> {
        self.list("all/", page).await
    }

    /// Requests awaiting a decision (superuser).
    pub async fn pending_requests(&self, page: u32) -> Result<Paginated<QrRequest>> {
        self.list("pending/", page).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .gateway
            .send(ApiRequest::delete(request_path(id, "")))
            .await?;
        ensure_success(&response)?;
        info!(id, "deleted QR request");
        Ok(())
    }

    pub async fn approve(&self, id: &str) -> Result<QrRequest> {
        let approved: QrRequest = self
            .fetch(ApiRequest::post(request_path(id, "approve/")))
            .await?;
        info!(id, qr_number = ?approved.qr_number, "approved QR request");
        Ok(approved)
    }

    pub async fn reject(&self, id: &str, reason: &str) -> Result<QrRequest> {
        let body = serde_json::to_value(RejectPayload {
            rejection_reason: reason,
        })
        .map_err(|e| Error::Decode(format!("serializing reject payload: {e}")))?;
        let rejected: QrRequest = self
            .fetch(ApiRequest::post(request_path(id, "reject/")).json(body))
            .await?;
        info!(id, "rejected QR request");
        Ok(rejected)
    }

    /// PNG image of the QR code for an approved request.
    pub async fn download_qr_code(&self, id: &str) -> Result<Bytes> {
        let response = self
            .gateway
            .send(ApiRequest::get(request_path(id, "qr-code/")))
            .await?;
        ensure_success(&response)?;
        debug!(id, bytes = response.body.len(), "downloaded QR code");
        Ok(response.body)
    }

    async fn list(&self, scope: &str, page: u32) -> Result<Paginated<QrRequest>> {
        let request = ApiRequest::get(format!("{QR_REQUESTS_PATH}{scope}")).query("page", page);
        self.fetch(request).await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.gateway.send(request).await?;
        ensure_success(&response)?;
        response
            .json()
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

fn request_path(id: &str, action: &str) -> String {
    format!("{QR_REQUESTS_PATH}{id}/{action}")
}

fn ensure_success(response: &ApiResponse) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(Error::from_response(response))
    }
}

/// Download file name for a guest's QR code: whitespace runs become `_`.
pub fn qr_file_name(guest_name: &str) -> String {
    let name = guest_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("qr_{name}.png")
}
