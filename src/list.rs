use crate::client::endpoint::{Endpoint, Surface};
use crate::client::types::ApiRequest;
use crate::prelude::{Error, Result, Session};
use crate::spec::{lookup, to_snake_case_keys};
use serde_json::{Map, Value, json};

/// Maximum page size enforced by the v3 intent surface.
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// Parameter names consumed by [`ListQuery::from_params`].
pub const LIST_KEYS: &[&str] = &[
    "length",
    "limit",
    "offset",
    "page",
    "filter",
    "custom_filter",
    "sort_order",
    "sort_attribute",
    "expand",
    "select",
];

/// Listing options of an info module.
///
/// # Fields
///
/// * `length`: Number of entities requested; `None` fetches everything.
/// * `offset`: Position of the first entity.
/// * `page`: Page number, v4 surfaces only.
/// * `filter`: Server-side filter expression.
/// * `custom_filter`: Client-side structural filter, applied after fetching.
///
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub length: Option<u64>,
    pub offset: u64,
    pub page: Option<u64>,
    pub filter: Option<String>,
    pub custom_filter: Option<Map<String, Value>>,
    pub sort_order: Option<String>,
    pub sort_attribute: Option<String>,
    pub expand: Option<String>,
    pub select: Option<String>,
}

impl ListQuery {
    /// Reads the listing options out of module parameters. `limit` is an
    /// alias of `length`.
    ///
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let number = |key: &str| -> Result<Option<u64>> {
            match params.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => value
                    .as_u64()
                    .map(Some)
                    .ok_or_else(|| Error::Config(format!("'{}' must be a non-negative integer", key))),
            }
        };
        let text = |key: &str| -> Result<Option<String>> {
            match params.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(value)) => Ok(Some(value.clone())),
                Some(_) => Err(Error::Config(format!("'{}' must be a string", key))),
            }
        };
        let custom_filter = match params.get("custom_filter") {
            None | Some(Value::Null) => None,
            Some(Value::Object(filter)) => Some(filter.clone()),
            Some(_) => return Err(Error::Config("'custom_filter' must be an object".to_owned())),
        };

        Ok(Self {
            length: number("length")?.or(number("limit")?),
            offset: number("offset")?.unwrap_or_default(),
            page: number("page")?,
            filter: text("filter")?,
            custom_filter,
            sort_order: text("sort_order")?,
            sort_attribute: text("sort_attribute")?,
            expand: text("expand")?,
            select: text("select")?,
        })
    }

    fn v3_body(&self, kind: &str, length: u64, offset: u64) -> Value {
        let mut body = Map::new();
        body.insert("kind".to_owned(), json!(kind));
        body.insert("length".to_owned(), json!(length));
        body.insert("offset".to_owned(), json!(offset));
        for (key, value) in [
            ("filter", &self.filter),
            ("sort_order", &self.sort_order),
            ("sort_attribute", &self.sort_attribute),
        ] {
            if let Some(value) = value {
                body.insert(key.to_owned(), json!(value));
            }
        }
        Value::Object(body)
    }

    fn order_by(&self) -> Option<String> {
        let attribute = self.sort_attribute.as_deref()?;
        Some(match self.sort_order.as_deref().map(str::to_ascii_lowercase) {
            Some(order) if order.starts_with("desc") => format!("{} desc", attribute),
            Some(_) => format!("{} asc", attribute),
            None => attribute.to_owned(),
        })
    }
}

/// Lists v3 entities, paging through `POST {resource}/list` as needed.
///
/// # Arguments
///
/// * `kind`: Entity kind sent in the list body, e.g. `vm`.
/// * `resource`: Resource path, e.g. `/vms`.
/// * `page_limit`: Largest page the server hands out.
///
/// # Returns
///
/// The list envelope of the last page with `entities` holding every fetched
/// (and filtered) entity and `metadata.offset`/`metadata.length` rewritten to
/// the caller's view.
///
#[tracing::instrument(level = "debug", target = "list", skip(session, query))]
pub async fn list_v3(
    session: &Session,
    kind: &str,
    resource: &str,
    query: &ListQuery,
    page_limit: u64,
) -> Result<Value> {
    if page_limit == 0 {
        return Err(Error::Config("page limit must be positive".to_owned()));
    }
    let url = session.url(&Endpoint::new(Surface::Intent, resource).sub("/list"))?;

    if let Some(length) = query.length.filter(|length| *length <= page_limit) {
        let body = query.v3_body(kind, length, query.offset);
        let mut response = session
            .send(ApiRequest::post(url).json(body).replay_safe())
            .await?
            .body;
        if let Some(filter) = &query.custom_filter {
            let entities = take_entities(&mut response, "entities");
            let entities = apply_filter(entities, filter);
            rewrite_metadata(&mut response, "entities", entities, query.offset);
        }
        return Ok(response);
    }

    let mut accumulated: Vec<Value> = Vec::new();
    let mut pages = 0;
    let mut envelope = loop {
        let offset = query
            .offset
            .checked_add(accumulated.len() as u64)
            .ok_or_else(|| Error::Config(format!("'offset' {} is out of range", query.offset)))?;
        let body = query.v3_body(kind, page_limit, offset);
        let mut response = session
            .send(ApiRequest::post(url.clone()).json(body).replay_safe())
            .await?
            .body;
        pages += 1;

        let page = take_entities(&mut response, "entities");
        let page_len = page.len() as u64;
        let total_matches = response.pointer("/metadata/total_matches").and_then(Value::as_u64);
        accumulated.extend(page);
        let fetched = accumulated.len() as u64;
        tracing::debug!(target: "list", pages, page_len, fetched, ?total_matches, "Page fetched");

        if page_len < page_limit
            || query.length.is_some_and(|length| fetched >= length)
            || total_matches.is_some_and(|total| query.offset.saturating_add(fetched) >= total)
        {
            break response;
        }
    };

    if let Some(length) = query.length {
        accumulated.truncate(length as usize);
    }
    if let Some(filter) = &query.custom_filter {
        accumulated = apply_filter(accumulated, filter);
    }
    tracing::info!(target: "list", pages, returned = accumulated.len(), "Listing finished");
    rewrite_metadata(&mut envelope, "entities", accumulated, query.offset);

    Ok(envelope)
}

/// Lists v4 entities with a single `GET` and snake-cases the result.
///
#[tracing::instrument(level = "debug", target = "list", skip(session, query))]
pub async fn list_v4(
    session: &Session,
    surface: Surface,
    resource: &str,
    query: &ListQuery,
) -> Result<Value> {
    let mut endpoint = Endpoint::new(surface, resource);
    if let Some(page) = query.page {
        endpoint = endpoint.query("$page", page);
    }
    if let Some(length) = query.length {
        endpoint = endpoint.query("$limit", length);
    }
    if let Some(filter) = &query.filter {
        endpoint = endpoint.query("$filter", filter);
    }
    if let Some(order_by) = query.order_by() {
        endpoint = endpoint.query("$orderby", order_by);
    }
    if let Some(select) = &query.select {
        endpoint = endpoint.query("$select", select);
    }
    if let Some(expand) = &query.expand {
        endpoint = endpoint.query("$expand", expand);
    }

    let response = session.send(ApiRequest::get(session.url(&endpoint)?)).await?;
    let mut response = to_snake_case_keys(response.body);
    if let Some(filter) = &query.custom_filter {
        let entities = apply_filter(take_entities(&mut response, "data"), filter);
        tracing::debug!(target: "list", returned = entities.len(), "Custom filter applied");
        if let Some(object) = response.as_object_mut() {
            object.insert("data".to_owned(), Value::Array(entities));
        }
    }

    Ok(response)
}

/// Structural intersection of `entity` with `filter`.
///
/// Filter keys are dotted paths; an object value is matched recursively
/// against the object found at its path. A missing path never matches.
///
pub fn matches_filter(entity: &Value, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(path, expected)| match lookup(entity, path) {
        None => false,
        Some(found) => match (expected, found) {
            (Value::Object(expected), found @ Value::Object(_)) => matches_filter(found, expected),
            (expected, found) => expected == found,
        },
    })
}

fn apply_filter(entities: Vec<Value>, filter: &Map<String, Value>) -> Vec<Value> {
    entities
        .into_iter()
        .filter(|entity| matches_filter(entity, filter))
        .collect()
}

fn take_entities(response: &mut Value, key: &str) -> Vec<Value> {
    match response.get_mut(key).map(Value::take) {
        Some(Value::Array(entities)) => entities,
        _ => Vec::new(),
    }
}

fn rewrite_metadata(envelope: &mut Value, key: &str, entities: Vec<Value>, offset: u64) {
    if !envelope.is_object() {
        *envelope = json!({});
    }
    let length = entities.len();
    if let Some(object) = envelope.as_object_mut() {
        object.insert(key.to_owned(), Value::Array(entities));
        let metadata = object
            .entry("metadata")
            .or_insert_with(|| json!({}));
        if let Some(metadata) = metadata.as_object_mut() {
            metadata.insert("offset".to_owned(), json!(offset));
            metadata.insert("length".to_owned(), json!(length));
        }
    }
}
