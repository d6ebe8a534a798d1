/// Item endpoints
use crate::{
    api::{json_body, path_params},
    auth::{
        extract::{AdminAuthContext, AuthContext},
        Capability, Claims,
    },
    context::AppContext,
    error::{GenericResponse, WishlistError, WishlistResult},
    metrics,
    store::{Item, ItemId, UserId},
    validation::{accept, AddItemRequest},
};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Item as shown to callers; the reserver is only included for admins
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemView {
    pub id: ItemId,
    pub name: String,
    pub url: String,
    pub rank: i64,
    pub reserved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserver_id: Option<UserId>,
}

impl ItemView {
    fn public(item: Item) -> Self {
        Self {
            id: item.id,
            reserved: item.is_reserved(),
            name: item.name,
            url: item.url,
            rank: item.rank,
            reserver_id: None,
        }
    }

    fn admin(item: Item) -> Self {
        let reserver_id = item.reserved_by;
        Self {
            reserver_id,
            ..Self::public(item)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ItemsResponse {
    pub code: u16,
    pub message: String,
    pub items: Vec<ItemView>,
}

impl ItemsResponse {
    fn ok(message: &str, items: Vec<ItemView>) -> Json<Self> {
        Json(Self {
            code: StatusCode::OK.as_u16(),
            message: message.to_string(),
            items,
        })
    }
}

fn ok(message: &str) -> Json<GenericResponse> {
    Json(GenericResponse::new(StatusCode::OK, message))
}

fn require(claims: &Claims, capability: Capability) -> WishlistResult<()> {
    if !claims.can(capability) {
        tracing::debug!("User {} lacks {:?}", claims.id, capability);
        return Err(WishlistError::Forbidden);
    }
    Ok(())
}

/// Build item routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(get_wanted_items).post(add_item))
        .route("/all", get(get_all_items))
        .route("/reserved", get(get_reserved_items))
        .route("/id/:item_id", delete(delete_item))
        .route("/id/:item_id/reserve", post(reserve_item))
        .route("/id/:item_id/unreserve", post(unreserve_item))
        .route("/id/:item_id/rank/:rank", post(edit_item_rank))
}

async fn get_wanted_items(State(ctx): State<AppContext>) -> WishlistResult<Json<ItemsResponse>> {
    let items = ctx.items.get_wanted().await.map_err(|e| {
        metrics::record_item_error(metrics::ITEM_GET_ERROR);
        e
    })?;

    Ok(ItemsResponse::ok(
        "Got a list of Wanted items",
        items.into_iter().map(ItemView::public).collect(),
    ))
}

async fn get_all_items(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> WishlistResult<Json<ItemsResponse>> {
    let items = ctx.items.get_all().await.map_err(|e| {
        metrics::record_item_error(metrics::ITEM_GET_ERROR);
        e
    })?;

    Ok(ItemsResponse::ok(
        "Got a list of all items",
        items.into_iter().map(ItemView::admin).collect(),
    ))
}

async fn get_reserved_items(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> WishlistResult<Json<ItemsResponse>> {
    require(&auth.claims, Capability::ReserveItems)?;
    let items = ctx.items.get_reserved(auth.claims.id).await.map_err(|e| {
        metrics::record_item_error(metrics::ITEM_GET_ERROR);
        e
    })?;

    Ok(ItemsResponse::ok(
        "Got a list of your reserved items",
        items.into_iter().map(ItemView::public).collect(),
    ))
}

async fn add_item(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> WishlistResult<Json<GenericResponse>> {
    let request = accept(json_body(payload)?)?;

    ctx.items
        .add_item(&request.name, &request.url, request.rank)
        .await
        .map_err(|e| {
            metrics::record_item_error(metrics::ITEM_ADD_ERROR);
            e
        })?;

    tracing::debug!("Item added by admin {}", admin.claims.id);
    Ok(ok("Item Created."))
}

async fn delete_item(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    item_id: Result<Path<ItemId>, PathRejection>,
) -> WishlistResult<Json<GenericResponse>> {
    let item_id = path_params(item_id)?;

    ctx.items.delete_item(item_id).await.map_err(|e| {
        metrics::record_item_error(metrics::ITEM_DELETE_ERROR);
        e
    })?;

    Ok(ok("Item Deleted."))
}

async fn reserve_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    item_id: Result<Path<ItemId>, PathRejection>,
) -> WishlistResult<Json<GenericResponse>> {
    let item_id = path_params(item_id)?;
    require(&auth.claims, Capability::ReserveItems)?;

    ctx.items
        .reserve_item(item_id, auth.claims.id)
        .await
        .map_err(|e| {
            metrics::record_item_error(metrics::ITEM_EDIT_ERROR);
            e
        })?;

    Ok(ok("Item Reserved."))
}

async fn unreserve_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    item_id: Result<Path<ItemId>, PathRejection>,
) -> WishlistResult<Json<GenericResponse>> {
    let item_id = path_params(item_id)?;
    require(&auth.claims, Capability::ReserveItems)?;

    ctx.items
        .unreserve_item(item_id, auth.claims.id)
        .await
        .map_err(|e| {
            metrics::record_item_error(metrics::ITEM_EDIT_ERROR);
            e
        })?;

    Ok(ok("Item Unreserved."))
}

async fn edit_item_rank(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    params: Result<Path<(ItemId, i64)>, PathRejection>,
) -> WishlistResult<Json<GenericResponse>> {
    let (item_id, rank) = path_params(params)?;

    ctx.items.edit_item_rank(item_id, rank).await.map_err(|e| {
        metrics::record_item_error(metrics::ITEM_EDIT_ERROR);
        e
    })?;

    Ok(ok("Item Rank Updated."))
}
