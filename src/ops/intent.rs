use crate::client::endpoint::{Endpoint, Surface};
use crate::client::types::ApiRequest;
use crate::list::list_v3;
use crate::ops::{Context, Invocation, Module, OperationResult};
use crate::prelude::{Error, Result};
use crate::spec::schema::BuilderTable;
use crate::spec::{generate_spec, is_unchanged};
use crate::task::TaskHandle;
use async_trait::async_trait;
use serde_json::{Map, Value, json};

pub const API_VERSION: &str = "3.1.0";

/// Metadata attributes dropped from the envelope sent back on update.
const VOLATILE_METADATA: &[&str] = &["last_update_time", "creation_time"];

/// Module for a v3 intent resource.
///
/// # Fields
///
/// * `kind`: Entity kind carried in `metadata.kind`.
/// * `resource`: Collection path, e.g. `/vms`.
/// * `id_param`: Parameter naming the entity uuid, e.g. `vm_uuid`.
/// * `page_limit`: Largest page handed out by the list endpoint.
///
#[derive(Debug, Clone, Copy)]
pub struct IntentResource {
    pub name: &'static str,
    pub kind: &'static str,
    pub resource: &'static str,
    pub id_param: &'static str,
    pub table: &'static BuilderTable,
    pub page_limit: u64,
}

impl IntentResource {
    fn endpoint(&self, uuid: Option<&str>) -> Endpoint {
        let endpoint = Endpoint::new(Surface::Intent, self.resource);
        match uuid {
            Some(uuid) => endpoint.ext_id(uuid),
            None => endpoint,
        }
    }

    /// Wraps a spec into the v3 request envelope.
    ///
    pub fn envelope(&self, spec: Value, metadata: Value) -> Value {
        json!({
            "api_version": API_VERSION,
            "metadata": metadata,
            "spec": spec,
        })
    }

    /// Reads the full `{metadata, spec, status}` document of an entity.
    ///
    pub async fn get(&self, ctx: &Context, uuid: &str) -> Result<Value> {
        let url = ctx.session.url(&self.endpoint(Some(uuid)))?;
        Ok(ctx.session.send(ApiRequest::get(url)).await?.body)
    }

    /// Creates the entity and, when waiting, reads it back.
    ///
    /// # Returns
    ///
    /// The uuid of the created entity once its task has succeeded; `None` in
    /// check mode, without waiting, or when the server did not report one.
    ///
    pub async fn create_entity(
        &self,
        ctx: &Context,
        inv: &Invocation,
        out: &mut OperationResult,
    ) -> Result<Option<String>> {
        let spec = generate_spec(json!({}), &inv.params, self.table)?;
        let body = self.envelope(spec, json!({ "kind": self.kind }));
        if ctx.check_mode {
            out.response = body;
            return Ok(None);
        }

        let url = ctx.session.url(&self.endpoint(None))?;
        let response = ctx.session.send(ApiRequest::post(url).json(body)).await?.body;
        out.changed = true;
        let uuid = response
            .pointer("/metadata/uuid")
            .and_then(Value::as_str)
            .map(str::to_owned);
        out.ext_id = uuid.clone();
        tracing::info!(target: "ops", kind = self.kind, ?uuid, "Create accepted");

        let handle = TaskHandle::normalize(&response)?;
        let Some(task) = ctx.follow(inv, &handle, out).await? else {
            return Ok(None);
        };
        let Some(uuid) = uuid.or_else(|| task.entities_affected.first().map(|entity| entity.ext_id.clone()))
        else {
            out.response = task.to_json();
            return Ok(None);
        };

        out.response = self.get(ctx, &uuid).await?;
        out.ext_id = Some(uuid.clone());
        Ok(Some(uuid))
    }
}

#[async_trait]
impl Module for IntentResource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn id_param(&self) -> &'static str {
        self.id_param
    }

    async fn create(&self, ctx: &Context, inv: &Invocation, out: &mut OperationResult) -> Result<()> {
        self.create_entity(ctx, inv, out).await.map(|_| ())
    }

    /// GET, overlay the parameters on a clone of the current spec, and PUT
    /// the result back with the current `spec_version` unless nothing changed.
    ///
    async fn update(&self, ctx: &Context, inv: &Invocation, uuid: &str, out: &mut OperationResult) -> Result<()> {
        let current = self.get(ctx, uuid).await?;
        let Some(mut metadata) = current.get("metadata").and_then(Value::as_object).cloned() else {
            return Err(Error::Protocol(format!("{} {} has no metadata", self.kind, uuid)));
        };
        if !metadata.contains_key("uuid") || !metadata.contains_key("spec_version") {
            return Err(Error::Protocol(format!(
                "{} {} lacks metadata.uuid or metadata.spec_version",
                self.kind, uuid
            )));
        }
        out.ext_id = Some(uuid.to_owned());

        let current_spec = current.get("spec").cloned().unwrap_or_else(|| json!({}));
        let desired = generate_spec(current_spec.clone(), &inv.params, self.table)?;
        if is_unchanged(&desired, &current_spec, self.table) {
            tracing::info!(target: "ops", kind = self.kind, uuid, "Nothing to change");
            out.skip(current);
            return Ok(());
        }

        metadata.retain(|key, _| !VOLATILE_METADATA.contains(&key.as_str()));
        let body = self.envelope(desired, Value::Object(metadata));
        if ctx.check_mode {
            out.response = body;
            return Ok(());
        }

        let url = ctx.session.url(&self.endpoint(Some(uuid)))?;
        let response = ctx.session.send(ApiRequest::put(url).json(body)).await?.body;
        out.changed = true;

        let handle = TaskHandle::normalize(&response)?;
        if ctx.follow(inv, &handle, out).await?.is_some() {
            out.response = self.get(ctx, uuid).await?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, inv: &Invocation, uuid: &str, out: &mut OperationResult) -> Result<()> {
        let url = ctx.session.url(&self.endpoint(Some(uuid)))?;
        let response = ctx.session.send(ApiRequest::delete(url)).await?.body;
        out.changed = true;
        out.ext_id = Some(uuid.to_owned());

        if response.is_null() {
            out.response = json!({});
            return Ok(());
        }
        let handle = TaskHandle::normalize(&response)?;
        if let Some(task) = ctx.follow(inv, &handle, out).await? {
            out.response = task.to_json();
        }
        Ok(())
    }

    async fn read(&self, ctx: &Context, _inv: &Invocation, uuid: &str, out: &mut OperationResult) -> Result<()> {
        out.response = self.get(ctx, uuid).await?;
        out.ext_id = Some(uuid.to_owned());
        Ok(())
    }

    async fn list(&self, ctx: &Context, inv: &Invocation, out: &mut OperationResult) -> Result<()> {
        out.response = list_v3(&ctx.session, self.kind, self.resource, &inv.list, self.page_limit).await?;
        Ok(())
    }
}

/// Sets `{kind, uuid}` references such as `cluster_reference`.
///
/// Accepts a bare uuid or an object carrying `uuid` (and optionally `name`).
///
pub fn reference(kind: &str, value: &Value) -> Result<Value> {
    let mut reference = Map::new();
    reference.insert("kind".to_owned(), json!(kind));
    match value {
        Value::String(uuid) => {
            reference.insert("uuid".to_owned(), json!(uuid));
        }
        Value::Object(fields) if fields.get("uuid").is_some_and(Value::is_string) => {
            for key in ["uuid", "name"] {
                if let Some(field) = fields.get(key) {
                    reference.insert(key.to_owned(), field.clone());
                }
            }
        }
        _ => return Err(Error::Config(format!("a {} reference must carry a uuid", kind))),
    }
    Ok(Value::Object(reference))
}
