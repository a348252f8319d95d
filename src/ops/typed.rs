use crate::client::endpoint::{Endpoint, Surface};
use crate::client::types::{ApiRequest, ApiResponse};
use crate::etag::require_etag;
use crate::list::list_v4;
use crate::ops::{Context, Invocation, Module, OperationResult};
use crate::prelude::Result;
use crate::spec::schema::BuilderTable;
use crate::spec::{
    generate_spec, is_unchanged, strip_internal_attributes, to_camel_case_keys, to_snake_case_keys,
};
use crate::task::{TaskHandle, TaskRecord, entity_ext_id, extract_ext_id};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Where the id of a created entity is published on the finished task.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedId {
    /// `entitiesAffected[].rel` of the created entity.
    Rel(&'static str),
    /// Name of a completion detail, e.g. `volumeGroupExtIds`.
    CompletionKey(&'static str),
}

impl CreatedId {
    pub fn find(&self, task: &TaskRecord) -> Option<String> {
        match self {
            CreatedId::Rel(rel) => entity_ext_id(task, rel),
            CreatedId::CompletionKey(key) => extract_ext_id(task, key),
        }
    }
}

/// Module for a v4 typed resource. Mutations of existing entities are
/// guarded by the entity's ETag.
///
#[derive(Debug, Clone, Copy)]
pub struct TypedResource {
    pub name: &'static str,
    pub surface: Surface,
    pub resource: &'static str,
    pub table: &'static BuilderTable,
    pub created: CreatedId,
}

impl TypedResource {
    fn endpoint(&self, ext_id: Option<&str>) -> Endpoint {
        let endpoint = Endpoint::new(self.surface, self.resource);
        match ext_id {
            Some(ext_id) => endpoint.ext_id(ext_id),
            None => endpoint,
        }
    }

    async fn get(&self, ctx: &Context, ext_id: &str) -> Result<ApiResponse> {
        let url = ctx.session.url(&self.endpoint(Some(ext_id)))?;
        ctx.session.send(ApiRequest::get(url)).await
    }

    /// Entity of a read response, in snake_case.
    ///
    fn entity(response: &ApiResponse) -> Value {
        let data = response.body.get("data").unwrap_or(&response.body);
        to_snake_case_keys(data.clone())
    }

    /// Request body for a spec tree: server-owned attributes removed, keys
    /// in camelCase.
    ///
    fn wire_body(&self, mut spec: Value) -> Value {
        strip_internal_attributes(&mut spec, self.table);
        to_camel_case_keys(spec)
    }
}

#[async_trait]
impl Module for TypedResource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn create(&self, ctx: &Context, inv: &Invocation, out: &mut OperationResult) -> Result<()> {
        let spec = generate_spec(json!({}), &inv.params, self.table)?;
        if ctx.check_mode {
            out.response = spec;
            return Ok(());
        }

        let url = ctx.session.url(&self.endpoint(None))?;
        let request = ApiRequest::post(url).json(self.wire_body(spec)).request_id();
        let response = ctx.session.send(request).await?;
        out.changed = true;

        let handle = TaskHandle::normalize(&response.body)?;
        tracing::info!(target: "ops", resource = self.name, task = handle.ext_id(), "Create accepted");
        let Some(task) = ctx.follow(inv, &handle, out).await? else {
            return Ok(());
        };

        match self.created.find(&task) {
            Some(ext_id) => {
                out.response = Self::entity(&self.get(ctx, &ext_id).await?);
                out.ext_id = Some(ext_id);
            }
            None => {
                tracing::warn!(target: "ops", resource = self.name, created = ?self.created, "Created id not reported by task");
                out.response = task.to_json();
            }
        }
        Ok(())
    }

    /// GET (capturing the ETag), reconcile, then PUT with `If-Match`.
    ///
    async fn update(&self, ctx: &Context, inv: &Invocation, ext_id: &str, out: &mut OperationResult) -> Result<()> {
        let response = self.get(ctx, ext_id).await?;
        let etag = require_etag(&response, &format!("{} {}", self.name, ext_id))?;
        let current = Self::entity(&response);
        out.ext_id = Some(ext_id.to_owned());

        let desired = generate_spec(current.clone(), &inv.params, self.table)?;
        if is_unchanged(&desired, &current, self.table) {
            tracing::info!(target: "ops", resource = self.name, ext_id, "Nothing to change");
            out.skip(current);
            return Ok(());
        }
        if ctx.check_mode {
            out.response = desired;
            return Ok(());
        }

        let url = ctx.session.url(&self.endpoint(Some(ext_id)))?;
        let request = ApiRequest::put(url)
            .json(self.wire_body(desired))
            .if_match(&etag)?
            .request_id();
        let response = ctx.session.send(request).await?;
        out.changed = true;

        let handle = TaskHandle::normalize(&response.body)?;
        if ctx.follow(inv, &handle, out).await?.is_some() {
            out.response = Self::entity(&self.get(ctx, ext_id).await?);
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, inv: &Invocation, ext_id: &str, out: &mut OperationResult) -> Result<()> {
        let response = self.get(ctx, ext_id).await?;
        let etag = require_etag(&response, &format!("{} {}", self.name, ext_id))?;
        out.ext_id = Some(ext_id.to_owned());

        let url = ctx.session.url(&self.endpoint(Some(ext_id)))?;
        let request = ApiRequest::delete(url).if_match(&etag)?.request_id();
        let response = ctx.session.send(request).await?;
        out.changed = true;

        if response.body.is_null() {
            out.response = json!({});
            return Ok(());
        }
        let handle = TaskHandle::normalize(&response.body)?;
        if let Some(task) = ctx.follow(inv, &handle, out).await? {
            out.response = task.to_json();
        }
        Ok(())
    }

    async fn read(&self, ctx: &Context, _inv: &Invocation, ext_id: &str, out: &mut OperationResult) -> Result<()> {
        out.response = Self::entity(&self.get(ctx, ext_id).await?);
        out.ext_id = Some(ext_id.to_owned());
        Ok(())
    }

    async fn list(&self, ctx: &Context, inv: &Invocation, out: &mut OperationResult) -> Result<()> {
        out.response = list_v4(&ctx.session, self.surface, self.resource, &inv.list).await?;
        Ok(())
    }
}
