//! Identity resources
//!
//! Firebase Authentication user accounts through the Identity Toolkit v1
//! admin endpoints.

use super::pager::{paginate, Page};
use super::{ParameterBag, ResourceClient, ResourceKind, Snapshot, SnapshotStream};
use crate::error::BackendError;
use crate::gcp::client::GcpClient;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// Fields accepted by create, with the defaults the tool applies
///
/// `emailVerified` and `disabled` default to `false` when not given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateFields {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub disabled: bool,
}

impl CreateFields {
    pub fn from_params(params: &ParameterBag) -> Self {
        Self {
            email: params.get("email").map(str::to_string),
            password: params.get("password").map(str::to_string),
            display_name: params.get("displayName").map(str::to_string),
            email_verified: params.flag("emailVerified").unwrap_or(false),
            disabled: params.flag("disabled").unwrap_or(false),
        }
    }

    /// Body for `POST accounts`
    pub fn request_body(&self) -> Value {
        let mut body = Map::new();
        if let Some(email) = &self.email {
            body.insert("email".into(), json!(email));
        }
        if let Some(password) = &self.password {
            body.insert("password".into(), json!(password));
        }
        if let Some(name) = &self.display_name {
            body.insert("displayName".into(), json!(name));
        }
        body.insert("emailVerified".into(), json!(self.email_verified));
        body.insert("disabled".into(), json!(self.disabled));
        Value::Object(body)
    }

    /// Snapshot fields for the created user; never includes the password
    pub fn snapshot_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(email) = &self.email {
            fields.insert("email".into(), json!(email));
        }
        if let Some(name) = &self.display_name {
            fields.insert("displayName".into(), json!(name));
        }
        fields.insert("emailVerified".into(), json!(self.email_verified));
        fields.insert("disabled".into(), json!(self.disabled));
        fields
    }
}

/// Fields accepted by update; only the supplied ones change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateFields {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub email_verified: Option<bool>,
    pub disabled: Option<bool>,
}

impl UpdateFields {
    pub fn from_params(params: &ParameterBag) -> Self {
        Self {
            email: params.get("email").map(str::to_string),
            password: params.get("password").map(str::to_string),
            display_name: params.get("displayName").map(str::to_string),
            email_verified: params.flag("emailVerified"),
            disabled: params.flag("disabled"),
        }
    }

    /// Body for `POST accounts:update`
    pub fn request_body(&self, user_id: &str) -> Value {
        let mut body = Map::new();
        body.insert("localId".into(), json!(user_id));
        if let Some(email) = &self.email {
            body.insert("email".into(), json!(email));
        }
        if let Some(password) = &self.password {
            body.insert("password".into(), json!(password));
        }
        if let Some(name) = &self.display_name {
            body.insert("displayName".into(), json!(name));
        }
        if let Some(verified) = self.email_verified {
            body.insert("emailVerified".into(), json!(verified));
        }
        if let Some(disabled) = self.disabled {
            // The update endpoint names this flag differently from lookup
            body.insert("disableUser".into(), json!(disabled));
        }
        Value::Object(body)
    }

    /// Snapshot fields this update sets; never includes the password
    pub fn snapshot_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(email) = &self.email {
            fields.insert("email".into(), json!(email));
        }
        if let Some(name) = &self.display_name {
            fields.insert("displayName".into(), json!(name));
        }
        if let Some(verified) = self.email_verified {
            fields.insert("emailVerified".into(), json!(verified));
        }
        if let Some(disabled) = self.disabled {
            fields.insert("disabled".into(), json!(disabled));
        }
        fields
    }
}

/// Snapshot of an Identity Toolkit user record
pub fn decode_user(user: &Value) -> Result<Snapshot, BackendError> {
    let id = user
        .get("localId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BackendError::malformed("user record without localId"))?;

    let mut fields = Map::new();
    for key in ["email", "displayName", "phoneNumber", "photoUrl"] {
        if let Some(value) = user.get(key).and_then(|v| v.as_str()) {
            fields.insert(key.to_string(), json!(value));
        }
    }
    for key in ["emailVerified", "disabled"] {
        let value = user.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        fields.insert(key.to_string(), json!(value));
    }
    for key in ["createdAt", "lastLoginAt"] {
        if let Some(ts) = user.get(key).and_then(millis_to_rfc3339) {
            fields.insert(key.to_string(), json!(ts));
        }
    }
    if let Some(providers) = user.get("providerUserInfo").and_then(|v| v.as_array()) {
        let ids: Vec<&str> = providers
            .iter()
            .filter_map(|p| p.get("providerId").and_then(|v| v.as_str()))
            .collect();
        fields.insert("providers".into(), json!(ids));
    }

    Ok(Snapshot::new(id, fields))
}

/// Identity Toolkit timestamps are epoch milliseconds sent as strings
fn millis_to_rfc3339(value: &Value) -> Option<String> {
    let millis = match value {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Client for Firebase Authentication users
pub struct IdentityClient {
    client: GcpClient,
    page_size: u32,
}

impl IdentityClient {
    pub fn new(client: GcpClient, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }

    async fn fetch_page(&self, token: Option<String>) -> Result<Page, BackendError> {
        let mut url = format!(
            "{}?maxResults={}",
            self.client.identity_url("accounts:batchGet"),
            self.page_size
        );
        if let Some(token) = token {
            url.push_str(&format!("&nextPageToken={}", urlencoding::encode(&token)));
        }

        let response = self.client.get(&url).await?;
        let items = response
            .get("users")
            .and_then(|v| v.as_array())
            .map(|users| users.iter().map(decode_user).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();
        let next_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Page::new(items, next_token))
    }
}

#[async_trait]
impl ResourceClient for IdentityClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Identity
    }

    async fn create(&self, params: &ParameterBag) -> Result<Snapshot, BackendError> {
        let fields = CreateFields::from_params(params);
        let url = self.client.identity_url("accounts");
        let response = self.client.post(&url, &fields.request_body()).await?;

        let id = response
            .get("localId")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BackendError::malformed("create response without localId"))?;

        tracing::info!("Created user {}", id);
        Ok(Snapshot::new(id, fields.snapshot_fields()))
    }

    async fn read(&self, id: &str) -> Result<Snapshot, BackendError> {
        let url = self.client.identity_url("accounts:lookup");
        let response = self.client.post(&url, &json!({ "localId": [id] })).await?;

        // Unknown ids come back as a 200 without `users`
        match response
            .get("users")
            .and_then(|v| v.as_array())
            .and_then(|users| users.first())
        {
            Some(user) => decode_user(user),
            None => Err(BackendError::Rejected {
                status: 404,
                code: "USER_NOT_FOUND".to_string(),
                message: format!("no user record for '{}'", id),
            }),
        }
    }

    fn scan(&self) -> SnapshotStream<'_> {
        paginate(move |token| self.fetch_page(token))
    }

    async fn update(&self, id: &str, params: &ParameterBag) -> Result<Snapshot, BackendError> {
        let fields = UpdateFields::from_params(params);
        let url = self.client.identity_url("accounts:update");
        let response = self.client.post(&url, &fields.request_body(id)).await?;

        // The update response omits some fields (disabled); overlay what we set
        let mut snapshot = match response.get("localId") {
            Some(_) => decode_user(&response)?,
            None => Snapshot::new(id, Map::new()),
        };
        if response.get("disabled").is_none() {
            snapshot.fields.remove("disabled");
        }
        snapshot.fields.extend(fields.snapshot_fields());

        tracing::info!("Updated user {}", id);
        Ok(snapshot)
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        let url = self.client.identity_url("accounts:delete");
        self.client.post(&url, &json!({ "localId": id })).await?;
        tracing::info!("Deleted user {}", id);
        Ok(())
    }
}
