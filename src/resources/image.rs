use crate::client::endpoint::{Endpoint, Surface};
use crate::client::types::ApiRequest;
use crate::list::DEFAULT_PAGE_LIMIT;
use crate::ops::intent::IntentResource;
use crate::ops::{Context, Invocation, Module, OperationResult};
use crate::prelude::{Error, Result};
use crate::spec::schema::{BuilderTable, Entry, Kind};
use crate::upload::{ChunkReader, DEFAULT_CHUNK_SIZE};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

pub const TABLE: BuilderTable = BuilderTable {
    entries: &[
        Entry::field("name", Kind::Scalar),
        Entry::at("desc", "description", Kind::Scalar),
        Entry::at("image_type", "resources.image_type", Kind::Scalar),
        Entry::at("source_uri", "resources.source_uri", Kind::Scalar),
        Entry::at("checksum", "resources.checksum", Kind::Map),
        Entry::at("version", "resources.version", Kind::Map),
    ],
    read_only: &[
        "resources.retrieval_uri_list",
        "resources.size_bytes",
        "resources.architecture",
    ],
    ignored: &[],
};

const IMAGES: IntentResource = IntentResource {
    name: "image",
    kind: "image",
    resource: "/images",
    id_param: "image_uuid",
    table: &TABLE,
    page_limit: DEFAULT_PAGE_LIMIT,
};

/// Disk and ISO images, `/api/nutanix/v3/images`.
///
/// Besides `source_uri`, an image may be created from a local file given as
/// `source_path`; the file is uploaded once the create task has succeeded.
///
#[derive(Debug, Clone, Copy)]
pub struct Image;

fn source_path(params: &serde_json::Map<String, Value>) -> Result<Option<&Path>> {
    let has_uri = params.get("source_uri").is_some_and(|uri| !uri.is_null());
    match params.get("source_path") {
        None | Some(Value::Null) => Ok(None),
        Some(_) if has_uri => Err(Error::Config(
            "'source_uri' and 'source_path' are mutually exclusive".to_owned(),
        )),
        Some(Value::String(path)) => Ok(Some(Path::new(path))),
        Some(_) => Err(Error::Config("'source_path' must be a string".to_owned())),
    }
}

#[async_trait]
impl Module for Image {
    fn name(&self) -> &'static str {
        IMAGES.name
    }

    fn id_param(&self) -> &'static str {
        IMAGES.id_param
    }

    async fn create(&self, ctx: &Context, inv: &Invocation, out: &mut OperationResult) -> Result<()> {
        let Some(path) = source_path(&inv.params)? else {
            return IMAGES.create_entity(ctx, inv, out).await.map(|_| ());
        };
        let reader = ChunkReader::open(path, DEFAULT_CHUNK_SIZE).await?;

        // The file can only be uploaded into an existing image.
        let mut inv = inv.clone();
        inv.wait = true;
        let Some(uuid) = IMAGES.create_entity(ctx, &inv, out).await? else {
            return Ok(());
        };

        let url = ctx
            .session
            .url(&Endpoint::new(Surface::Intent, IMAGES.resource).ext_id(&uuid).sub("/file"))?;
        tracing::info!(target: "ops", uuid, total_len = reader.total_len(), "Uploading image file");
        let request = ApiRequest::put(url)
            .upload(reader)
            .timeout(ctx.session.connection.upload_timeout());
        ctx.session.send(request).await?;

        out.response = IMAGES.get(ctx, &uuid).await?;
        Ok(())
    }

    async fn update(&self, ctx: &Context, inv: &Invocation, uuid: &str, out: &mut OperationResult) -> Result<()> {
        IMAGES.update(ctx, inv, uuid, out).await
    }

    async fn delete(&self, ctx: &Context, inv: &Invocation, uuid: &str, out: &mut OperationResult) -> Result<()> {
        IMAGES.delete(ctx, inv, uuid, out).await
    }

    async fn read(&self, ctx: &Context, inv: &Invocation, uuid: &str, out: &mut OperationResult) -> Result<()> {
        IMAGES.read(ctx, inv, uuid, out).await
    }

    async fn list(&self, ctx: &Context, inv: &Invocation, out: &mut OperationResult) -> Result<()> {
        IMAGES.list(ctx, inv, out).await
    }
}
