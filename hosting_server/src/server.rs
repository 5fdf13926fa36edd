use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use checkout_gateway::GatewayApi;
use hosting_engine::{
    notifications::{InAppChannel, LogChannel, NotificationDispatcher},
    LifecycleApi,
    SqliteDatabase,
};
use log::info;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    payment_routes::{CheckoutRoute, PaymentWebhookRoute},
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        health,
        AddNoteRoute,
        ApproveOrderRoute,
        CreateOrderRoute,
        DeleteOrderRoute,
        MarkNotificationReadRoute,
        NotificationsRoute,
        OrderByIdRoute,
        OrdersRoute,
        ProvisionSharingRoute,
        ReactivateOrderRoute,
        RecordPaymentRoute,
        RejectOrderRoute,
        SharingInfoRoute,
        SuspendOrderRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway =
        GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database ready at {}", config.database_url);
    start_reconciliation_worker(db.clone(), build_dispatcher(&db), config.reconciliation_interval);
    let srv = create_server_instance(config, db, gateway)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn build_dispatcher(db: &SqliteDatabase) -> NotificationDispatcher {
    let mut dispatcher = NotificationDispatcher::new();
    dispatcher.add_channel(InAppChannel::new(db.clone()));
    dispatcher.add_channel(LogChannel);
    dispatcher
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: GatewayApi,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let api = LifecycleApi::new(db.clone(), build_dispatcher(&db));
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("hpg::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(config.gateway.clone()))
            .app_data(web::Data::new(config.checkout_urls.clone()));
        let api_scope = web::scope("/api")
            .service(OrdersRoute::<SqliteDatabase>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(ApproveOrderRoute::<SqliteDatabase>::new())
            .service(RejectOrderRoute::<SqliteDatabase>::new())
            .service(SuspendOrderRoute::<SqliteDatabase>::new())
            .service(ReactivateOrderRoute::<SqliteDatabase>::new())
            .service(DeleteOrderRoute::<SqliteDatabase>::new())
            .service(RecordPaymentRoute::<SqliteDatabase>::new())
            .service(AddNoteRoute::<SqliteDatabase>::new())
            .service(SharingInfoRoute::<SqliteDatabase>::new())
            .service(ProvisionSharingRoute::<SqliteDatabase>::new())
            .service(NotificationsRoute::<SqliteDatabase>::new())
            .service(MarkNotificationReadRoute::<SqliteDatabase>::new());
        let payments_scope = web::scope("/payments")
            .service(CheckoutRoute::<SqliteDatabase, GatewayApi>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(payments_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
