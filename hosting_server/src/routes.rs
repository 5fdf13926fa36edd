//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into
//! a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are async so that a slow database never blocks a worker thread. Every handler returns
//! `Result<HttpResponse, ServerError>`; the error's `ResponseError` impl turns rejections into
//! structured JSON with the right status code.
use std::str::FromStr;

use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use hosting_engine::{
    db_types::{NewOrder, OrderId},
    provisioning::ProvisioningApi,
    traits::{LifecycleDatabase, LifecycleError, PaymentFacts},
    LifecycleApi,
};
use hpg_common::MinorUnits;
use log::*;

use crate::{
    data_objects::{JsonResponse, NoteParams, NotificationQuery, OrderDetail, ReasonParams, RecordPaymentParams, SharingInfo},
    errors::ServerError,
};

// Actix cannot handle generics in handlers, so the service registration is implemented manually
// using the `route!` macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
            impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(orders => Get "/orders" impl LifecycleDatabase);
pub async fn orders<B: LifecycleDatabase>(api: web::Data<LifecycleApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET orders");
    let orders = api.db().fetch_orders().await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/order/{id}" impl LifecycleDatabase);
pub async fn order_by_id<B: LifecycleDatabase>(
    path: web::Path<String>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    debug!("💻️ GET order {order_id}");
    let db = api.db();
    let order = db.fetch_order(&order_id).await?.ok_or(LifecycleError::OrderNotFound(order_id.clone()))?;
    let history = db.fetch_history(&order_id).await?;
    let notes = db.fetch_notes(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderDetail { order, history, notes }))
}

route!(create_order => Post "/orders" impl LifecycleDatabase);
pub async fn create_order<B: LifecycleDatabase>(
    body: web::Json<NewOrder>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let new_order = body.into_inner();
    debug!("💻️ POST new order {}", new_order.order_id);
    let (order, inserted) = api.create_order(new_order).await?;
    let response = if inserted { HttpResponse::Created() } else { HttpResponse::Ok() }.json(order);
    Ok(response)
}

route!(approve_order => Post "/order/{id}/approve" impl LifecycleDatabase);
pub async fn approve_order<B: LifecycleDatabase>(
    path: web::Path<String>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    debug!("💻️ POST approve order {order_id}");
    let change = api.approve_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(change))
}

route!(reject_order => Post "/order/{id}/reject" impl LifecycleDatabase);
pub async fn reject_order<B: LifecycleDatabase>(
    path: web::Path<String>,
    body: web::Json<ReasonParams>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    debug!("💻️ POST reject order {order_id}");
    let change = api.reject_order(&order_id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(change))
}

route!(suspend_order => Post "/order/{id}/suspend" impl LifecycleDatabase);
pub async fn suspend_order<B: LifecycleDatabase>(
    path: web::Path<String>,
    body: web::Json<ReasonParams>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    debug!("💻️ POST suspend order {order_id}");
    let change = api.suspend_order(&order_id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(change))
}

route!(reactivate_order => Post "/order/{id}/reactivate" impl LifecycleDatabase);
pub async fn reactivate_order<B: LifecycleDatabase>(
    path: web::Path<String>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    debug!("💻️ POST reactivate order {order_id}");
    let change = api.reactivate_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(change))
}

route!(delete_order => Delete "/order/{id}" impl LifecycleDatabase);
pub async fn delete_order<B: LifecycleDatabase>(
    path: web::Path<String>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    info!("💻️ DELETE order {order_id}");
    api.db().delete_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {order_id} deleted"))))
}

route!(record_payment => Post "/order/{id}/payment" impl LifecycleDatabase);
pub async fn record_payment<B: LifecycleDatabase>(
    path: web::Path<String>,
    body: web::Json<RecordPaymentParams>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    let params = body.into_inner();
    debug!("💻️ POST record payment for order {order_id}");
    let facts = PaymentFacts {
        amount: MinorUnits::from(params.amount),
        method: params.method,
        reference: params.reference.unwrap_or_default(),
        paid_at: params.paid_at.unwrap_or_else(Utc::now),
    };
    let order = api.mark_order_paid(&order_id, facts).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Notes  ----------------------------------------------------
route!(add_note => Post "/order/{id}/notes" impl LifecycleDatabase);
pub async fn add_note<B: LifecycleDatabase>(
    path: web::Path<String>,
    body: web::Json<NoteParams>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    debug!("💻️ POST note for order {order_id}");
    let note = api.db().add_note(&order_id, &body.note).await?;
    Ok(HttpResponse::Created().json(note))
}

//----------------------------------------------   Sharing  ----------------------------------------------------
route!(sharing_info => Get "/order/{id}/sharing" impl LifecycleDatabase);
pub async fn sharing_info<B: LifecycleDatabase>(
    path: web::Path<String>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    debug!("💻️ GET sharing info for order {order_id}");
    let account = api
        .db()
        .fetch_account_for_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::InvalidRequestPath(format!("Order {order_id} has no provisioned account")))?;
    Ok(HttpResponse::Ok().json(SharingInfo {
        domain: account.domain,
        sharing_token: account.sharing_token,
        pin: account.pin,
    }))
}

route!(provision_sharing => Post "/order/{id}/sharing" impl LifecycleDatabase);
pub async fn provision_sharing<B: LifecycleDatabase>(
    path: web::Path<String>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = order_id_from_path(path)?;
    debug!("💻️ POST provision sharing for order {order_id}");
    let db = api.db();
    let order = db.fetch_order(&order_id).await?.ok_or(LifecycleError::OrderNotFound(order_id.clone()))?;
    let account = ProvisioningApi::new(db.clone()).provision(&order).await?;
    Ok(HttpResponse::Ok().json(SharingInfo {
        domain: account.domain,
        sharing_token: account.sharing_token,
        pin: account.pin,
    }))
}

//----------------------------------------------   Notifications  ----------------------------------------------------
route!(notifications => Get "/notifications" impl LifecycleDatabase);
pub async fn notifications<B: LifecycleDatabase>(
    query: web::Query<NotificationQuery>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET notifications");
    let notifications = api.db().fetch_notifications(query.unread_only).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

route!(mark_notification_read => Post "/notification/{id}/read" impl LifecycleDatabase);
pub async fn mark_notification_read<B: LifecycleDatabase>(
    path: web::Path<i64>,
    api: web::Data<LifecycleApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST mark notification {id} read");
    api.db().mark_notification_read(id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Notification marked as read")))
}

fn order_id_from_path(path: web::Path<String>) -> Result<OrderId, ServerError> {
    OrderId::from_str(&path.into_inner()).map_err(|_| ServerError::InvalidRequestPath("Invalid order id".to_string()))
}
