//! API handlers for pages.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

use super::constants::{internal_formatter, MAX_BODY_SIZE, MAX_SLUG_LENGTH, MAX_TITLE_LENGTH};
use super::queries;
use super::types::{
    CreatePageRequest, InternalPageRequest, PageListItem, PageNamespace, PageResponse,
    UpdatePageRequest,
};
use crate::admin::{AdminPermissions, AdminUser};
use crate::api::AppState;
use crate::error::{AppError, AppResult, FieldErrors};

// ============================================================================
// Validation
// ============================================================================

fn push(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn check_title(errors: &mut FieldErrors, title: &str) {
    let len = title.trim().chars().count();
    if len == 0 || len > MAX_TITLE_LENGTH {
        push(
            errors,
            "title",
            &format!("Field must be between 1 and {MAX_TITLE_LENGTH} characters long."),
        );
    }
}

fn check_body(errors: &mut FieldErrors, body: &str) {
    if body.len() > MAX_BODY_SIZE {
        push(errors, "body", "Field is too large.");
    }
}

fn check_slug(errors: &mut FieldErrors, slug: &str) {
    let valid_chars = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if slug.is_empty() || slug.len() > MAX_SLUG_LENGTH || !valid_chars {
        push(
            errors,
            "slug",
            "Field must be lowercase letters, digits, dashes or underscores.",
        );
    } else if queries::is_reserved_slug(slug) {
        push(errors, "slug", "This slug is reserved.");
    }
}

fn finish(errors: FieldErrors) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ParamsInvalid(errors))
    }
}

async fn ensure_slug_free(state: &AppState, slug: &str, exclude_id: Option<i64>) -> AppResult<()> {
    if queries::slug_exists(&state.db, PageNamespace::Public, slug, exclude_id).await? {
        return Err(AppError::invalid("slug", "This slug is already taken."));
    }
    Ok(())
}

// ============================================================================
// Public
// ============================================================================

/// List public pages.
#[tracing::instrument(skip(state))]
pub async fn list_pages(State(state): State<AppState>) -> AppResult<Json<Vec<PageListItem>>> {
    Ok(Json(queries::list_public(&state.db).await?))
}

/// Get a public page by slug.
#[tracing::instrument(skip(state))]
pub async fn get_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<PageResponse>> {
    let page = queries::public_page_from_slug(&state.db, &slug)
        .await?
        .ok_or(AppError::NotFound("page"))?;
    Ok(Json(page.into()))
}

// ============================================================================
// Admin: public pages
// ============================================================================

#[tracing::instrument(skip(state, admin))]
pub async fn admin_list_pages(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
) -> AppResult<Json<Vec<PageListItem>>> {
    admin.require(AdminPermissions::MANAGE_PAGES)?;
    Ok(Json(queries::list_public(&state.db).await?))
}

#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn create_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Json(req): Json<CreatePageRequest>,
) -> AppResult<(StatusCode, Json<PageResponse>)> {
    admin.require(AdminPermissions::MANAGE_PAGES)?;

    let slug = req
        .slug
        .clone()
        .unwrap_or_else(|| queries::slugify(&req.title));

    let mut errors = FieldErrors::new();
    check_title(&mut errors, &req.title);
    check_body(&mut errors, &req.body);
    check_slug(&mut errors, &slug);
    finish(errors)?;
    ensure_slug_free(&state, &slug, None).await?;

    let page = queries::create(
        &state.db,
        PageNamespace::Public,
        &slug,
        req.title.trim(),
        &req.body,
        req.formatter,
    )
    .await?;

    info!(page_id = page.id, slug = %page.slug, "Page created");
    Ok((StatusCode::CREATED, Json(page.into())))
}

#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn update_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(slug): Path<String>,
    Json(req): Json<UpdatePageRequest>,
) -> AppResult<Json<PageResponse>> {
    admin.require(AdminPermissions::MANAGE_PAGES)?;

    let mut page = queries::public_page_from_slug(&state.db, &slug)
        .await?
        .ok_or(AppError::NotFound("page"))?;

    let mut errors = FieldErrors::new();
    if let Some(title) = &req.title {
        check_title(&mut errors, title);
    }
    if let Some(body) = &req.body {
        check_body(&mut errors, body);
    }
    if let Some(new_slug) = &req.slug {
        check_slug(&mut errors, new_slug);
    }
    finish(errors)?;

    if let Some(new_slug) = req.slug {
        if new_slug != page.slug {
            ensure_slug_free(&state, &new_slug, Some(page.id)).await?;
            page.slug = new_slug;
        }
    }
    if let Some(title) = req.title {
        page.title = title.trim().to_string();
    }
    if let Some(body) = req.body {
        page.body = body;
    }
    if let Some(formatter) = req.formatter {
        page.formatter = formatter;
    }

    let page = queries::save(&state.db, &page).await?;
    info!(page_id = page.id, slug = %page.slug, "Page updated");
    Ok(Json(page.into()))
}

#[tracing::instrument(skip(state, admin), fields(admin = %admin.username))]
pub async fn delete_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    admin.require(AdminPermissions::MANAGE_PAGES)?;

    if !queries::delete(&state.db, PageNamespace::Public, &slug).await? {
        return Err(AppError::NotFound("page"));
    }
    info!(slug = %slug, "Page deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Admin: internal pages
// ============================================================================

#[tracing::instrument(skip(state, admin))]
pub async fn list_internal_pages(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
) -> AppResult<Json<Vec<PageListItem>>> {
    admin.require(AdminPermissions::MANAGE_PAGES)?;
    Ok(Json(queries::list_internal(&state.db).await?))
}

#[tracing::instrument(skip(state, admin))]
pub async fn get_internal_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(slug): Path<String>,
) -> AppResult<Json<PageResponse>> {
    admin.require(AdminPermissions::MANAGE_PAGES)?;

    let page = queries::internal_page_from_slug(&state.db, &slug)
        .await?
        .ok_or(AppError::NotFound("page"))?;
    Ok(Json(page.into()))
}

/// Create or replace a whitelisted internal page.
#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn put_internal_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(slug): Path<String>,
    Json(req): Json<InternalPageRequest>,
) -> AppResult<Json<PageResponse>> {
    admin.require(AdminPermissions::MANAGE_PAGES)?;

    let formatter = internal_formatter(&slug).ok_or(AppError::NotFound("page"))?;

    let mut errors = FieldErrors::new();
    check_title(&mut errors, &req.title);
    check_body(&mut errors, &req.body);
    finish(errors)?;

    let page =
        queries::upsert_internal(&state.db, &slug, req.title.trim(), &req.body, formatter).await?;
    info!(slug = %slug, "Internal page written");
    Ok(Json(page.into()))
}

#[tracing::instrument(skip(state, admin), fields(admin = %admin.username))]
pub async fn delete_internal_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    admin.require(AdminPermissions::MANAGE_PAGES)?;

    if internal_formatter(&slug).is_none()
        || !queries::delete(&state.db, PageNamespace::Internal, &slug).await?
    {
        return Err(AppError::NotFound("page"));
    }
    info!(slug = %slug, "Internal page deleted");
    Ok(StatusCode::NO_CONTENT)
}
