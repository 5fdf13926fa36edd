use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Container, ContainerId, Invoice, InvoiceStatus},
    traits::{LifecycleError, PaidOutcome, PaymentFacts, ResolutionError, ResolutionStrategy},
};

/// Resolves a container reference using the ordered fallback chain. Each strategy only runs when
/// the previous one found nothing; the first hit wins and later strategies are never consulted.
pub async fn resolve_container(identifier: &str, conn: &mut SqliteConnection) -> Result<Container, LifecycleError> {
    let mut attempted = Vec::with_capacity(3);

    attempted.push(ResolutionStrategy::ExactId);
    let exact: Option<Container> =
        sqlx::query_as("SELECT * FROM containers WHERE container_id = $1").bind(identifier).fetch_optional(&mut *conn).await?;
    if let Some(container) = exact {
        trace!("🗃️ Container '{identifier}' resolved by exact id");
        return Ok(container);
    }

    attempted.push(ResolutionStrategy::SecondaryId);
    let legacy: Option<Container> = sqlx::query_as("SELECT * FROM containers WHERE CAST(legacy_id AS TEXT) = $1")
        .bind(identifier)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(container) = legacy {
        trace!("🗃️ Container '{identifier}' resolved by legacy id");
        return Ok(container);
    }

    attempted.push(ResolutionStrategy::NameOrToken);
    let fuzzy: Option<Container> =
        sqlx::query_as("SELECT * FROM containers WHERE name LIKE '%' || $1 || '%' OR sharing_token = $1 LIMIT 1")
            .bind(identifier)
            .fetch_optional(conn)
            .await?;
    if let Some(container) = fuzzy {
        trace!("🗃️ Container '{identifier}' resolved by name or sharing token");
        return Ok(container);
    }

    Err(ResolutionError::new("container", identifier, attempted).into())
}

/// Resolves an invoice within a container: exact invoice id first, then the human-readable number
/// coerced to string equality.
pub async fn resolve_invoice(
    container: &ContainerId,
    identifier: &str,
    conn: &mut SqliteConnection,
) -> Result<Invoice, LifecycleError> {
    let mut attempted = Vec::with_capacity(2);

    attempted.push(ResolutionStrategy::ExactId);
    let exact: Option<Invoice> = sqlx::query_as("SELECT * FROM invoices WHERE container_id = $1 AND invoice_id = $2")
        .bind(container.as_str())
        .bind(identifier)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(invoice) = exact {
        return Ok(invoice);
    }

    attempted.push(ResolutionStrategy::SecondaryId);
    let by_number: Option<Invoice> =
        sqlx::query_as("SELECT * FROM invoices WHERE container_id = $1 AND CAST(number AS TEXT) = $2")
            .bind(container.as_str())
            .bind(identifier)
            .fetch_optional(conn)
            .await?;
    if let Some(invoice) = by_number {
        return Ok(invoice);
    }

    Err(ResolutionError::new("invoice", identifier, attempted).into())
}

/// Marks an invoice paid. The `status = 'Unpaid'` guard in the WHERE clause makes the write
/// idempotent at the statement level; a paid invoice is returned untouched as `AlreadyPaid`.
pub async fn mark_invoice_paid(
    container: &ContainerId,
    invoice_id: &str,
    facts: &PaymentFacts,
    conn: &mut SqliteConnection,
) -> Result<PaidOutcome, LifecycleError> {
    let updated: Option<Invoice> = sqlx::query_as(
        r#"
            UPDATE invoices SET
                status = 'Paid',
                paid_amount = $3,
                paid_at = $4,
                payment_method = $5,
                payment_reference = $6
            WHERE container_id = $1 AND invoice_id = $2 AND status = 'Unpaid'
            RETURNING *;
        "#,
    )
    .bind(container.as_str())
    .bind(invoice_id)
    .bind(facts.amount)
    .bind(facts.paid_at)
    .bind(facts.method.as_str())
    .bind(facts.reference.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(invoice) = updated {
        debug!("🗃️ Invoice {} in container {container} marked paid", invoice.number);
        return Ok(PaidOutcome::Applied(invoice));
    }
    let existing: Option<Invoice> = sqlx::query_as("SELECT * FROM invoices WHERE container_id = $1 AND invoice_id = $2")
        .bind(container.as_str())
        .bind(invoice_id)
        .fetch_optional(conn)
        .await?;
    match existing {
        Some(invoice) if invoice.status == InvoiceStatus::Paid => Ok(PaidOutcome::AlreadyPaid(invoice)),
        Some(_) => Err(LifecycleError::DatabaseError(format!(
            "Invoice {invoice_id} in container {container} could not be marked paid"
        ))),
        None => Err(ResolutionError::new("invoice", invoice_id, vec![ResolutionStrategy::ExactId]).into()),
    }
}

pub async fn session_processed(session_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let found: Option<(String,)> = sqlx::query_as("SELECT session_id FROM processed_sessions WHERE session_id = $1")
        .bind(session_id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Records a gateway session id. Returns `false` if the id was already present, without writing.
pub async fn record_processed_session(session_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT OR IGNORE INTO processed_sessions (session_id) VALUES ($1)")
        .bind(session_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
