use std::collections::HashMap;

use chrono::Utc;
use ops_stats_to_xlsx::ReportOptions;
use serde::Serialize;
use url::Url;
use worker::{Context, Env, Request, Response, Result, RouteContext, Router};

use crate::error::ApiError;
use crate::models::{
    ArtifactListResponse, ArtifactMetadata, ArtifactRecord, DeleteResponse, PAGES_VAR,
    ProcessResponse, REPORTS_BINDING, UploadListResponse, UploadMetadata, UploadRecord,
    UploadResponse, XLSX_CONTENT_TYPE,
};
use crate::pipeline;
use crate::storage::ReportStore;
use crate::upload::{
    PDF_EXTENSION, XLSX_EXTENSION, artifact_key, attachment_disposition, file_from_key,
    key_prefix, stored_file_name, upload_file_name, upload_key,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub options: ReportOptions,
}

pub async fn handle(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    let pages = env.var(PAGES_VAR).map(|value| value.to_string()).ok();
    let options = match pipeline::report_options(pages.as_deref()) {
        Ok(options) => options,
        Err(error) => return error.into_response(),
    };

    Router::with_data(AppState { options })
        .post_async("/api/v1/uploads", upload_route)
        .get_async("/api/v1/uploads", list_uploads_route)
        .delete_async("/api/v1/uploads", delete_upload_route)
        .post_async("/api/v1/process", process_route)
        .get_async("/api/v1/downloads", list_downloads_route)
        .get_async("/api/v1/download", download_route)
        .delete_async("/api/v1/downloads", delete_download_route)
        .run(req, env)
        .await
}

fn store(ctx: &RouteContext<AppState>) -> Result<ReportStore, ApiError> {
    Ok(ReportStore::new(ctx.env.kv(REPORTS_BINDING)?))
}

fn respond<T>(result: Result<T, ApiError>) -> Result<Response>
where
    T: Serialize,
{
    match result {
        Ok(payload) => json_response(&payload),
        Err(error) => error.into_response(),
    }
}

async fn upload_route(mut req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    respond(upload_response(&mut req, &ctx).await)
}

async fn list_uploads_route(_req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    respond(list_uploads_response(&ctx).await)
}

async fn delete_upload_route(req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    respond(delete_response(&req, &ctx, PDF_EXTENSION).await)
}

async fn process_route(req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    respond(process_upload_response(&req, &ctx).await)
}

async fn list_downloads_route(_req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    respond(list_downloads_response(&ctx).await)
}

async fn download_route(req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    match download_response(&req, &ctx).await {
        Ok(response) => Ok(response),
        Err(error) => error.into_response(),
    }
}

async fn delete_download_route(req: Request, ctx: RouteContext<AppState>) -> Result<Response> {
    respond(delete_response(&req, &ctx, XLSX_EXTENSION).await)
}

async fn upload_response(
    req: &mut Request,
    ctx: &RouteContext<AppState>,
) -> Result<UploadResponse, ApiError> {
    let query = parse_query(&req.url()?);
    let raw_name = required_param(&query, "filename")?;
    let file = upload_file_name(raw_name)?;

    let body = req.bytes().await?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
    }

    let metadata = UploadMetadata {
        name: optional_param(&query, "name"),
        title: optional_param(&query, "title"),
        uploaded_at: Utc::now().to_rfc3339(),
        size: body.len(),
    };
    let key = upload_key(&ctx.data.options.areas, &file);
    store(ctx)?.put_bytes(&key, &body, &metadata).await?;
    worker::console_log!("stored upload {key} ({} bytes)", body.len());

    Ok(UploadResponse {
        file,
        key,
        size: body.len(),
    })
}

async fn list_uploads_response(
    ctx: &RouteContext<AppState>,
) -> Result<UploadListResponse, ApiError> {
    let prefix = key_prefix(&ctx.data.options.areas.incoming);
    let items = store(ctx)?
        .list::<UploadMetadata>(&prefix)
        .await?
        .into_iter()
        .map(|stored| UploadRecord {
            file: file_from_key(&stored.key).to_string(),
            metadata: stored.metadata,
        })
        .collect();
    Ok(UploadListResponse { items })
}

async fn list_downloads_response(
    ctx: &RouteContext<AppState>,
) -> Result<ArtifactListResponse, ApiError> {
    let prefix = key_prefix(&ctx.data.options.areas.outgoing);
    let items = store(ctx)?
        .list::<ArtifactMetadata>(&prefix)
        .await?
        .into_iter()
        .map(|stored| ArtifactRecord {
            file: file_from_key(&stored.key).to_string(),
            metadata: stored.metadata,
        })
        .collect();
    Ok(ArtifactListResponse { items })
}

async fn process_upload_response(
    req: &Request,
    ctx: &RouteContext<AppState>,
) -> Result<ProcessResponse, ApiError> {
    let query = parse_query(&req.url()?);
    let file = stored_file_name(required_param(&query, "file")?, PDF_EXTENSION)?;
    pipeline::process_upload(&store(ctx)?, &file, &ctx.data.options).await
}

async fn download_response(
    req: &Request,
    ctx: &RouteContext<AppState>,
) -> Result<Response, ApiError> {
    let query = parse_query(&req.url()?);
    let file = stored_file_name(required_param(&query, "file")?, XLSX_EXTENSION)?;
    let key = artifact_key(&ctx.data.options.areas, &file);
    let workbook = store(ctx)?
        .get_bytes(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("download '{file}' not found")))?;

    let mut response = Response::from_bytes(workbook)?;
    response.headers_mut().set("Content-Type", XLSX_CONTENT_TYPE)?;
    response
        .headers_mut()
        .set("Content-Disposition", &attachment_disposition(&file))?;
    response.headers_mut().set("Cache-Control", "no-store")?;
    Ok(response)
}

/// Deletes one object from the area `extension` belongs to.
async fn delete_response(
    req: &Request,
    ctx: &RouteContext<AppState>,
    extension: &str,
) -> Result<DeleteResponse, ApiError> {
    let query = parse_query(&req.url()?);
    let file = stored_file_name(required_param(&query, "file")?, extension)?;
    let areas = &ctx.data.options.areas;
    let key = if extension == PDF_EXTENSION {
        upload_key(areas, &file)
    } else {
        artifact_key(areas, &file)
    };

    let store = store(ctx)?;
    if !store.exists(&key).await? {
        return Err(ApiError::NotFound(format!("'{file}' not found")));
    }
    store.delete(&key).await?;
    worker::console_log!("deleted {key}");

    Ok(DeleteResponse {
        file,
        deleted: true,
    })
}

fn json_response<T>(payload: &T) -> Result<Response>
where
    T: Serialize,
{
    let mut response = Response::from_json(payload)?;
    response.headers_mut().set("Cache-Control", "no-store")?;
    Ok(response)
}

pub fn parse_query(url: &Url) -> HashMap<String, String> {
    url.query_pairs()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn required_param<'a>(
    query: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, ApiError> {
    query
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing query parameter '{name}'")))
}

pub fn optional_param(query: &HashMap<String, String>, name: &str) -> String {
    query
        .get(name)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}
