use actix_web::{web, HttpResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::Result;
use crate::services::live::{Caller, CreateStreamRequest, JoinStreamRequest, UpdateStreamRequest};
use crate::state::AppState;

pub async fn create_stream(
    caller: Caller,
    state: web::Data<AppState>,
    payload: web::Json<CreateStreamRequest>,
) -> Result<HttpResponse> {
    payload.validate()?;
    let stream = state.live.create(&caller, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(stream))
}

pub async fn get_stream(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let stream = state.live.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn update_stream(
    path: web::Path<Uuid>,
    caller: Caller,
    state: web::Data<AppState>,
    payload: web::Json<UpdateStreamRequest>,
) -> Result<HttpResponse> {
    payload.validate()?;
    let stream = state
        .live
        .update(path.into_inner(), &caller, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn delete_stream(
    path: web::Path<Uuid>,
    caller: Caller,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.live.delete(path.into_inner(), &caller).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn start_stream(
    path: web::Path<Uuid>,
    caller: Caller,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let stream = state.live.start(path.into_inner(), &caller).await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn end_stream(
    path: web::Path<Uuid>,
    caller: Caller,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let stream = state.live.end(path.into_inner(), &caller).await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn join_stream(
    path: web::Path<Uuid>,
    caller: Caller,
    state: web::Data<AppState>,
    payload: Option<web::Json<JoinStreamRequest>>,
) -> Result<HttpResponse> {
    let request = payload.map(web::Json::into_inner).unwrap_or_default();
    let response = state
        .live
        .join(path.into_inner(), &caller, request)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn leave_stream(
    path: web::Path<Uuid>,
    caller: Caller,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.live.leave(path.into_inner(), &caller).await?;
    Ok(HttpResponse::Accepted().json(json!({ "success": true })))
}
