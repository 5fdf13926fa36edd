//----------------------------------------------   Payments  ----------------------------------------------------
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use checkout_gateway::{
    parse_webhook,
    CheckoutGateway,
    CheckoutRequest,
    GatewayConfig,
    PaymentCompleted,
    WebhookEvent,
    SIGNATURE_HEADER,
};
use hosting_engine::{
    db_types::InvoiceStatus,
    traits::{LifecycleDatabase, LifecycleError, PaymentFacts},
    LifecycleApi,
};
use log::*;
use serde_json::json;

use crate::{
    data_objects::{CheckoutParams, CheckoutResponse, CheckoutUrls, JsonResponse},
    errors::ServerError,
    route,
};

/// The gateway retries on 5xx, so slow processing is cut short and surfaced as 503 rather than
/// left to the gateway's own, much longer, HTTP timeout.
const WEBHOOK_DEADLINE: Duration = Duration::from_secs(10);

route!(checkout => Post "/checkout" impl LifecycleDatabase, CheckoutGateway);
/// Creates a hosted checkout session for an invoice.
///
/// The container and invoice are resolved through the fallback chains first, so a bad reference
/// fails with 404 (naming the attempted strategies) before the gateway is involved. When a
/// provisioned account matches the container's name, the request must carry that account's PIN.
pub async fn checkout<B, G>(
    body: web::Json<CheckoutParams>,
    api: web::Data<LifecycleApi<B>>,
    gateway: web::Data<G>,
    urls: web::Data<CheckoutUrls>,
) -> Result<HttpResponse, ServerError>
where
    B: LifecycleDatabase,
    G: CheckoutGateway,
{
    let params = body.into_inner();
    debug!("💳️ POST checkout for invoice '{}' in container '{}'", params.invoice_id, params.container_id);
    let db = api.db();
    let container = db.resolve_container(&params.container_id).await?;
    let invoice = db.resolve_invoice(&container.container_id, &params.invoice_id).await?;
    if invoice.status == InvoiceStatus::Paid {
        info!("💳️ Invoice {} is already paid. No checkout session created.", invoice.number);
        return Ok(HttpResponse::BadRequest().json(JsonResponse::failure("Invoice is already paid")));
    }
    if let Some(account) = db.fetch_account_for_domain(&container.name).await? {
        let pin_ok = params.pin.as_deref() == Some(account.pin.as_str());
        if !pin_ok {
            warn!("💳️ PIN check failed for container {}", container.container_id);
            return Err(LifecycleError::Validation("A valid PIN is required for this invoice".to_string()).into());
        }
    }
    let request = CheckoutRequest {
        amount: invoice.total_amount.value() as f64 / 100.0,
        currency: invoice.currency.clone(),
        description: format!("Invoice {}", invoice.number),
        invoice_id: invoice.invoice_id.clone(),
        container_id: container.container_id.to_string(),
        success_url: urls.success_url.clone(),
        cancel_url: urls.cancel_url.clone(),
    };
    let session = gateway.create_checkout(request).await?;
    info!("💳️ Checkout session {} created for invoice {}", session.session_id, invoice.number);
    Ok(HttpResponse::Ok().json(CheckoutResponse { success: true, url: session.url, session_id: session.session_id }))
}

route!(payment_webhook => Post "/webhook" impl LifecycleDatabase);
/// The signed gateway callback.
///
/// The signature is verified over the raw body before anything is parsed; a bad signature is a
/// hard 400. After that the policy is acknowledge-wherever-possible: duplicates, already-paid
/// invoices and unrecognized event types are all answered 200 so the gateway stops retrying. A
/// correctly signed event that matches nothing is also 200, with an operator alert raised
/// internally instead.
pub async fn payment_webhook<B: LifecycleDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<LifecycleApi<B>>,
    config: web::Data<GatewayConfig>,
) -> Result<HttpResponse, ServerError> {
    trace!("💳️ Received webhook request: {}", req.uri());
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::SignatureVerification)?;
    let event = parse_webhook(&body, signature, &config.webhook_secret).map_err(|e| {
        warn!("💳️ Webhook rejected: {e}");
        ServerError::SignatureVerification
    })?;
    let completed = match event {
        WebhookEvent::PaymentCompleted(completed) => completed,
        WebhookEvent::Unrecognized { event_type } => {
            debug!("💳️ Acknowledging '{event_type}' event without processing it");
            return Ok(received());
        },
    };
    let applied = tokio::time::timeout(WEBHOOK_DEADLINE, apply_payment(&api, &completed)).await.map_err(|_| {
        error!("💳️ Webhook processing for session {} exceeded the deadline", completed.session_id);
        ServerError::WebhookDeadlineExceeded
    })?;
    match applied {
        Ok(()) => Ok(received()),
        Err(LifecycleError::NotFound(e)) => {
            // Verified payment with no matching invoice. Acknowledge it and alert the operator.
            api.report_unmatched_payment(&completed.session_id, &e.to_string()).await;
            Ok(received())
        },
        Err(e) => {
            error!("💳️ Could not process payment event {}: {e}", completed.session_id);
            Err(e.into())
        },
    }
}

async fn apply_payment<B: LifecycleDatabase>(
    api: &LifecycleApi<B>,
    completed: &PaymentCompleted,
) -> Result<(), LifecycleError> {
    let facts = PaymentFacts {
        amount: completed.amount,
        method: completed.payment_method.clone(),
        reference: completed.reference.clone(),
        paid_at: completed.paid_at,
    };
    api.invoice_paid(&completed.session_id, &completed.metadata.container_id, &completed.metadata.invoice_id, facts)
        .await?;
    Ok(())
}

fn received() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "received": true }))
}
