//! Read-only endpoints backing the marketing site.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::{ApiError, ApiResult},
    helpers::blocking,
    models::{BlogPost, Project, Service},
    pagination::{PaginatedResponse, PaginationParams},
    response::ApiResponse,
    AppState,
};

#[utoipa::path(
    get,
    path = "/services",
    tag = "Public",
    responses(
        (status = 200, description = "Active services in display order", body = [Service]),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn list_services(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<Service>>>> {
    let store = state.store.clone();
    let services = blocking(move || store.list_active_services()).await?;
    Ok(Json(ApiResponse::ok("OK", services)))
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Public",
    params(PaginationParams),
    responses(
        (status = 200, description = "Portfolio projects", body = [Project])
    )
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<PaginatedResponse<Project>>>> {
    let store = state.store.clone();
    let (offset, limit) = (params.offset(), params.limit());
    let page = blocking(move || store.list_projects(offset, limit)).await?;

    Ok(Json(ApiResponse::ok(
        "OK",
        PaginatedResponse::from_page(page, &params),
    )))
}

#[utoipa::path(
    get,
    path = "/blog",
    tag = "Public",
    params(PaginationParams),
    responses(
        (status = 200, description = "Published posts, newest first", body = [BlogPost])
    )
)]
pub async fn list_blog_posts(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<PaginatedResponse<BlogPost>>>> {
    let store = state.store.clone();
    let (offset, limit) = (params.offset(), params.limit());
    let page = blocking(move || store.list_published_posts(offset, limit)).await?;

    Ok(Json(ApiResponse::ok(
        "OK",
        PaginatedResponse::from_page(page, &params),
    )))
}

/// Site settings as a flat key/value map.
#[utoipa::path(
    get,
    path = "/settings",
    tag = "Public",
    responses(
        (status = 200, description = "Company details keyed by setting name")
    )
)]
pub async fn get_settings(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<BTreeMap<String, String>>>> {
    let store = state.store.clone();
    let settings = blocking(move || store.list_settings()).await?;

    let map = settings
        .into_iter()
        .map(|s| (s.setting_key, s.setting_value))
        .collect();

    Ok(Json(ApiResponse::ok("OK", map)))
}
