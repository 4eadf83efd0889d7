//! Field-level edits and the pure transitions that apply them to a request.
//!
//! Every edit category has its own enum so the UI layer can only express
//! edits that make sense for that category (route keys, for instance, are not
//! editable at all). `apply` is the single entry point the store uses.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::{self, Divider, Keyed};
use crate::reconcile;
use crate::types::{
    Authorization, BodyKind, CacheMode, CorsMode, CredentialsMode, Parameter, RedirectMode,
    Request, RequestBody, Verb,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum BasicsEdit {
    Verb(Verb),
    /// Raw URL text as typed; route and query tables are reconciled from it.
    Url(String),
    VerbAndUrl { verb: Verb, url: String },
    Name(String),
    Description(String),
}

/// Structural edit on an ordered row collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ParameterEdit {
    Add { id: String, parameter: Parameter },
    Edit { id: String, parameter: Parameter },
    Remove { id: String },
}

/// Route rows take their key from the URL; only the rest is editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEdit {
    pub id: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum BodyEdit {
    Select { kind: BodyKind },
    FormData { edit: ParameterEdit },
    UrlEncoded { edit: ParameterEdit },
    RawText { text: String },
    #[serde(rename_all = "camelCase")]
    RawContentType { content_type: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum FetchEdit {
    CorsMode(CorsMode),
    Credentials(CredentialsMode),
    Cache(CacheMode),
    Redirect(RedirectMode),
}

/// Any user edit, tagged by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "edit", rename_all = "camelCase")]
pub enum Edit {
    Basics(BasicsEdit),
    Headers(ParameterEdit),
    Query(ParameterEdit),
    Route(RouteEdit),
    Body(BodyEdit),
    Authorization(Authorization),
    Fetch(FetchEdit),
}

pub(crate) fn apply(request_id: &str, request: &mut Request, edit: Edit) -> Result<(), StoreError> {
    match edit {
        Edit::Basics(edit) => {
            apply_basics(request_id, request, edit);
            Ok(())
        }
        Edit::Headers(edit) => {
            edit_rows(&mut request.headers, request_id, Divider::Header, edit)
                .map_err(|e| e.into_store_error(request_id, false))
        }
        Edit::Query(edit) => {
            edit_rows(&mut request.query_parameters, request_id, Divider::Query, edit)
                .map_err(|e| e.into_store_error(request_id, false))
        }
        Edit::Route(edit) => apply_route(request_id, request, edit),
        Edit::Body(edit) => apply_body(request_id, request, edit),
        Edit::Authorization(authorization) => {
            request.authorization = authorization;
            Ok(())
        }
        Edit::Fetch(edit) => {
            let params = &mut request.fetch_params;
            match edit {
                FetchEdit::CorsMode(mode) => params.cors_mode = mode,
                FetchEdit::Credentials(mode) => params.credentials = mode,
                FetchEdit::Cache(mode) => params.cache = mode,
                FetchEdit::Redirect(mode) => params.redirect = mode,
            }
            Ok(())
        }
    }
}

fn apply_basics(request_id: &str, request: &mut Request, edit: BasicsEdit) {
    match edit {
        BasicsEdit::Verb(verb) => request.verb = verb,
        BasicsEdit::Url(url) => reconcile::apply_url(request_id, request, &url),
        BasicsEdit::VerbAndUrl { verb, url } => {
            request.verb = verb;
            reconcile::apply_url(request_id, request, &url);
        }
        BasicsEdit::Name(name) => request.name = name,
        BasicsEdit::Description(description) => request.description = description,
    }
}

fn apply_route(request_id: &str, request: &mut Request, edit: RouteEdit) -> Result<(), StoreError> {
    let row = request
        .route_parameters
        .get_mut(&edit.id)
        .ok_or_else(|| StoreError::ParameterNotFound {
            request_id: request_id.to_string(),
            id: edit.id.clone(),
        })?;
    row.value = edit.value;
    row.description = edit.description;
    row.is_active = edit.is_active;
    Ok(())
}

fn apply_body(request_id: &str, request: &mut Request, edit: BodyEdit) -> Result<(), StoreError> {
    let conflict = |reason: &str| StoreError::Conflict {
        request_id: request_id.to_string(),
        reason: reason.to_string(),
    };

    match edit {
        BodyEdit::Select { kind } => {
            if request.body.kind() != kind {
                request.body = RequestBody::empty(kind);
            }
            Ok(())
        }
        BodyEdit::FormData { edit } => match &mut request.body {
            RequestBody::FormData { items } => edit_rows(items, request_id, Divider::FormData, edit)
                .map_err(|e| e.into_store_error(request_id, true)),
            _ => Err(conflict("body is not form-data")),
        },
        BodyEdit::UrlEncoded { edit } => match &mut request.body {
            RequestBody::UrlEncoded { items } => {
                edit_rows(items, request_id, Divider::UrlEncoded, edit)
                    .map_err(|e| e.into_store_error(request_id, true))
            }
            _ => Err(conflict("body is not url-encoded")),
        },
        BodyEdit::RawText { text } => match &mut request.body {
            RequestBody::RawText { text: current, .. } => {
                *current = text;
                Ok(())
            }
            _ => Err(conflict("body is not raw text")),
        },
        BodyEdit::RawContentType { content_type } => match &mut request.body {
            RequestBody::RawText {
                content_type: current,
                ..
            } => {
                current.clone_from(&content_type);
                upsert_content_type(request_id, &mut request.headers, &content_type);
                Ok(())
            }
            _ => Err(conflict("body is not raw text")),
        },
    }
}

/// Set the `Content-Type` header row, matching an existing one regardless of case.
pub(crate) fn upsert_content_type(request_id: &str, headers: &mut Keyed<Parameter>, value: &str) {
    if let Some(row) = headers
        .values_mut()
        .find(|row| row.key.eq_ignore_ascii_case("content-type"))
    {
        row.value = value.to_string();
        return;
    }
    let id = ids::allocate(request_id, Divider::Header, headers.len());
    headers.insert(id, Parameter::new("Content-Type", value));
}

#[derive(Debug)]
pub(crate) enum RowError {
    Duplicate(String),
    Missing(String),
}

impl RowError {
    /// Body rows report every mismatch as a conflict; other tables report a
    /// missing row as not found.
    fn into_store_error(self, request_id: &str, missing_is_conflict: bool) -> StoreError {
        match self {
            RowError::Duplicate(id) => StoreError::Conflict {
                request_id: request_id.to_string(),
                reason: format!("row {id} already exists"),
            },
            RowError::Missing(id) if missing_is_conflict => StoreError::Conflict {
                request_id: request_id.to_string(),
                reason: format!("row {id} does not exist"),
            },
            RowError::Missing(id) => StoreError::ParameterNotFound {
                request_id: request_id.to_string(),
                id,
            },
        }
    }
}

/// Apply a structural edit and keep ordinals dense.
pub(crate) fn edit_rows(
    rows: &mut Keyed<Parameter>,
    scope_id: &str,
    divider: Divider,
    edit: ParameterEdit,
) -> Result<(), RowError> {
    match edit {
        ParameterEdit::Add { id, parameter } => {
            if rows.contains_key(&id) {
                return Err(RowError::Duplicate(id));
            }
            rows.insert(id, parameter);
        }
        ParameterEdit::Edit { id, parameter } => {
            let row = rows.get_mut(&id).ok_or(RowError::Missing(id))?;
            *row = parameter;
            return Ok(());
        }
        ParameterEdit::Remove { id } => {
            rows.shift_remove(&id).ok_or(RowError::Missing(id))?;
        }
    }
    *rows = ids::rekey(scope_id, divider, std::mem::take(rows));
    Ok(())
}
