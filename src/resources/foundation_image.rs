use crate::client::endpoint::{Endpoint, Surface};
use crate::client::types::ApiRequest;
use crate::ops::{Action, Context, Invocation, Module, OperationResult, State};
use crate::prelude::{Error, Result};
use crate::upload::{ChunkReader, DEFAULT_CHUNK_SIZE};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;

pub const INSTALLER_TYPES: &[&str] = &["kvm", "esx", "hyperv", "linux", "nos"];

/// Resolves the installer type sent on the wire. `ahv` is accepted as an
/// alias of `kvm`; the rewrite is one-way and results always report `kvm`.
///
pub fn installer_type(value: &str) -> Result<&'static str> {
    let value = if value == "ahv" { "kvm" } else { value };
    INSTALLER_TYPES
        .iter()
        .find(|known| **known == value)
        .copied()
        .ok_or_else(|| {
            Error::Config(format!(
                "unsupported installer_type '{}', expected one of ahv, {}",
                value,
                INSTALLER_TYPES.join(", ")
            ))
        })
}

fn required<'a>(inv: &'a Invocation, key: &str) -> Result<&'a str> {
    inv.params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Config(format!("'{}' is required", key)))
}

/// Installer images stored on a Foundation VM, identified by file name.
///
#[derive(Debug, Clone, Copy)]
pub struct FoundationImage;

#[async_trait]
impl Module for FoundationImage {
    fn name(&self) -> &'static str {
        "foundation_image"
    }

    fn id_param(&self) -> &'static str {
        "filename"
    }

    fn route(&self, state: State, filename: Option<&str>) -> Result<Action> {
        match (state, filename) {
            (State::Info, _) => Ok(Action::List),
            (State::Present, None) | (State::Absent, None) => {
                Err(Error::Config("'filename' is required".to_owned()))
            }
            (State::Present, Some(_)) => Ok(Action::Create),
            (State::Absent, Some(filename)) => Ok(Action::Delete(filename.to_owned())),
        }
    }

    async fn create(&self, ctx: &Context, inv: &Invocation, out: &mut OperationResult) -> Result<()> {
        let filename = inv
            .ext_id
            .as_deref()
            .ok_or_else(|| Error::Config("'filename' is required".to_owned()))?;
        let installer_type = installer_type(required(inv, "installer_type")?)?;
        let source = required(inv, "source")?;
        out.ext_id = Some(filename.to_owned());
        if ctx.check_mode {
            out.response = json!({
                "filename": filename,
                "installer_type": installer_type,
                "source": source,
            });
            return Ok(());
        }

        let reader = ChunkReader::open(Path::new(source), DEFAULT_CHUNK_SIZE).await?;
        let endpoint = Endpoint::new(Surface::Foundation, "/upload")
            .query("filename", filename)
            .query("installer_type", installer_type);
        tracing::info!(target: "ops", filename, installer_type, total_len = reader.total_len(), "Uploading installer image");
        let request = ApiRequest::post(ctx.session.url(&endpoint)?)
            .upload(reader)
            .timeout(ctx.session.connection.upload_timeout());
        let response = ctx.session.send(request).await?;

        out.changed = true;
        out.response = match response.body {
            Value::Null => json!({}),
            body => body,
        };
        Ok(())
    }

    async fn delete(&self, ctx: &Context, inv: &Invocation, filename: &str, out: &mut OperationResult) -> Result<()> {
        let installer_type = installer_type(required(inv, "installer_type")?)?;
        let url = ctx.session.url(&Endpoint::new(Surface::Foundation, "/delete/"))?;
        let form = vec![
            ("installer_type".to_owned(), installer_type.to_owned()),
            ("filename".to_owned(), filename.to_owned()),
        ];
        let response = ctx.session.send(ApiRequest::post(url).form(form)).await?;

        out.changed = true;
        out.ext_id = Some(filename.to_owned());
        out.response = match response.body {
            Value::Null => json!({}),
            body => body,
        };
        Ok(())
    }

    async fn list(&self, ctx: &Context, _inv: &Invocation, out: &mut OperationResult) -> Result<()> {
        let url = ctx
            .session
            .url(&Endpoint::new(Surface::Foundation, "/enumerate_nos_packages"))?;
        out.response = ctx.session.send(ApiRequest::get(url)).await?.body;
        Ok(())
    }
}
