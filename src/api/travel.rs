use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::auth::AdminContext;
use super::error::{ApiError, ApiJson};
use super::validation::{apply_travel_edits, parse_travel_date, validate_new_travel};
use crate::auth::AuthContext;
use crate::db::{
    CreateTravelRequest, NewTravel, Travel, TravelStatus, TravelStore, UpdateTravelRequest,
    UpdateTravelStatusRequest,
};
use crate::AppState;

/// Load a travel request the caller is allowed to see.
/// Regular users only see their own; anything else is reported as missing.
async fn find_visible(state: &AppState, ctx: &AuthContext, id: i64) -> Result<Travel, ApiError> {
    state
        .store
        .find_travel(id)
        .await?
        .filter(|travel| ctx.is_admin() || travel.is_owned_by(ctx.user_id))
        .ok_or_else(|| ApiError::not_found("Travel request not found"))
}

/// Move a Pending request to its final status, stamping the reviewer
fn apply_status_change(
    travel: &mut Travel,
    next: TravelStatus,
    reviewer_id: i64,
    now: &str,
) -> Result<(), ApiError> {
    let current = travel.status_enum();
    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Cannot change status from {} to {}",
            current, next
        )));
    }

    travel.status = next.to_string();
    match next {
        TravelStatus::Approved => {
            travel.approved_by = Some(reviewer_id);
            travel.approved_at = Some(now.to_string());
        }
        TravelStatus::Rejected => {
            travel.rejected_by = Some(reviewer_id);
            travel.rejected_at = Some(now.to_string());
        }
        TravelStatus::Cancelled | TravelStatus::Pending => {}
    }
    Ok(())
}

/// True when the update carries a field value that differs from what is stored.
/// Clients commonly send the whole record back, so unchanged values don't count.
fn changes_fields(travel: &Travel, request: &UpdateTravelRequest) -> bool {
    if !request.edits_fields() {
        return false;
    }

    let date_changed = |requested: &Option<String>, stored: &str| match requested {
        Some(value) => match (parse_travel_date(value), parse_travel_date(stored)) {
            (Ok(a), Ok(b)) => a != b,
            _ => true,
        },
        None => false,
    };

    request
        .destination
        .as_deref()
        .is_some_and(|d| d.trim() != travel.destination)
        || request
            .purpose
            .as_deref()
            .is_some_and(|p| p.trim() != travel.purpose)
        || request
            .estimated_cost
            .is_some_and(|c| c != travel.estimated_cost)
        || date_changed(&request.start_date, &travel.start_date)
        || date_changed(&request.end_date, &travel.end_date)
}

async fn save(state: &AppState, travel: &Travel) -> Result<(), ApiError> {
    if !state.store.update_travel(travel).await? {
        return Err(ApiError::not_found("Travel request not found"));
    }
    Ok(())
}

/// List travel requests: all for Admin, own for everyone else
pub async fn list_travels(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
) -> Result<Json<Vec<Travel>>, ApiError> {
    let travels = if ctx.is_admin() {
        state.store.list_travels().await?
    } else {
        state.store.list_travels_for_user(ctx.user_id).await?
    };
    Ok(Json(travels))
}

pub async fn get_travel(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<Travel>, ApiError> {
    Ok(Json(find_visible(&state, &ctx, id).await?))
}

/// Create a travel request owned by the caller. New requests always start Pending.
pub async fn create_travel(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiJson(request): ApiJson<CreateTravelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (start_date, end_date) = validate_new_travel(&request)?;

    if let Some(status) = request.status.as_deref() {
        if !status.eq_ignore_ascii_case("pending") {
            tracing::debug!(user_id = ctx.user_id, status = %status, "Ignoring status supplied on create");
        }
    }

    let travel = state
        .store
        .insert_travel(NewTravel {
            user_id: ctx.user_id,
            destination: request.destination.trim().to_string(),
            start_date,
            end_date,
            purpose: request.purpose.trim().to_string(),
            estimated_cost: request.estimated_cost,
            comments: request.comments,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .await?;

    tracing::info!(travel_id = travel.id, user_id = ctx.user_id, "Created travel request");

    let location = format!("/api/travel/{}", travel.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(travel),
    ))
}

/// Update a travel request.
///
/// Field and comment edits are limited to the owner while the request is
/// Pending; status changes are limited to Admin and only out of Pending.
pub async fn update_travel(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    ApiJson(request): ApiJson<UpdateTravelRequest>,
) -> Result<Json<Travel>, ApiError> {
    if request.id.is_some_and(|body_id| body_id != id) {
        return Err(ApiError::bad_request("Travel request id does not match the URL"));
    }

    let mut travel = find_visible(&state, &ctx, id).await?;
    let now = chrono::Utc::now().to_rfc3339();

    let status_change = request.status.filter(|next| *next != travel.status_enum());
    let comments_change = request
        .comments
        .clone()
        .filter(|comments| travel.comments.as_ref() != Some(comments));

    // A reviewer's note only rides along with a status change; on its own
    // it is an edit like any other field.
    let owner_edit =
        changes_fields(&travel, &request) || (comments_change.is_some() && status_change.is_none());

    if owner_edit {
        if !travel.is_owned_by(ctx.user_id) {
            return Err(ApiError::forbidden("Only the owner can edit a travel request"));
        }
        if travel.status_enum() != TravelStatus::Pending {
            return Err(ApiError::conflict("Only pending travel requests can be edited"));
        }
        apply_travel_edits(&mut travel, &request)?;
    }

    if let Some(next) = status_change {
        if !ctx.is_admin() {
            return Err(ApiError::forbidden("Only administrators can change the status"));
        }
        apply_status_change(&mut travel, next, ctx.user_id, &now)?;
    }

    if let Some(comments) = comments_change {
        travel.comments = Some(comments);
    }
    travel.updated_at = Some(now);

    save(&state, &travel).await?;
    tracing::info!(travel_id = id, user_id = ctx.user_id, status = %travel.status, "Updated travel request");

    Ok(Json(travel))
}

/// Approve, reject or cancel a Pending request (Admin only)
pub async fn update_travel_status(
    State(state): State<Arc<AppState>>,
    AdminContext(admin): AdminContext,
    Path(id): Path<i64>,
    ApiJson(request): ApiJson<UpdateTravelStatusRequest>,
) -> Result<Json<Travel>, ApiError> {
    let mut travel = find_visible(&state, &admin, id).await?;
    let now = chrono::Utc::now().to_rfc3339();

    apply_status_change(&mut travel, request.status, admin.user_id, &now)?;
    if request.comments.is_some() {
        travel.comments = request.comments;
    }
    travel.updated_at = Some(now);

    save(&state, &travel).await?;
    tracing::info!(travel_id = id, admin_id = admin.user_id, status = %travel.status, "Reviewed travel request");

    Ok(Json(travel))
}

pub async fn delete_travel(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let travel = find_visible(&state, &ctx, id).await?;

    if !state.store.delete_travel(travel.id).await? {
        return Err(ApiError::not_found("Travel request not found"));
    }

    tracing::info!(travel_id = id, user_id = ctx.user_id, "Deleted travel request");
    Ok(StatusCode::NO_CONTENT)
}
