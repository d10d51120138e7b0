//! Background worker
//!
//! Runs the scheduled jobs the request path deliberately does not wait on:
//! draining the email outbox, pruning delivered outbox rows, and a periodic
//! heartbeat with sales totals for the logs.

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blackwell_ticketing::TicketEmailService;

const OUTBOX_BATCH_SIZE: i64 = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,blackwell_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = blackwell_shared::create_pool(&database_url).await?;

    let email = TicketEmailService::from_env();
    if !email.is_enabled() {
        tracing::warn!("RESEND_API_KEY not set; outbox rows will accumulate until it is");
    }

    tracing::info!("Starting Blackwell ticketing worker");

    let scheduler = JobScheduler::new().await?;

    // Drain pending ticket emails every minute.
    {
        let pool = pool.clone();
        let email = email.clone();
        scheduler
            .add(Job::new_async("0 * * * * *", move |_uuid, _lock| {
                let pool = pool.clone();
                let email = email.clone();
                Box::pin(async move {
                    let (sent, failed) = email.process_pending(&pool, OUTBOX_BATCH_SIZE).await;
                    if sent > 0 || failed > 0 {
                        tracing::info!(sent = sent, failed = failed, "Outbox drain pass complete");
                    }
                })
            })?)
            .await?;
    }

    // Prune delivered outbox rows daily at 03:00 UTC.
    {
        let pool = pool.clone();
        scheduler
            .add(Job::new_async("0 0 3 * * *", move |_uuid, _lock| {
                let pool = pool.clone();
                Box::pin(async move {
                    if let Err(e) = prune_outbox(&pool).await {
                        tracing::error!(error = %e, "Outbox prune failed");
                    }
                })
            })?)
            .await?;
    }

    // Heartbeat with sales totals every 5 minutes.
    {
        let pool = pool.clone();
        scheduler
            .add(Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
                let pool = pool.clone();
                Box::pin(async move {
                    match ticket_counts(&pool).await {
                        Ok((total, active)) => {
                            tracing::info!(
                                total_tickets = total,
                                active_tickets = active,
                                "Worker heartbeat"
                            );
                        }
                        Err(e) => tracing::error!(error = %e, "Heartbeat query failed"),
                    }
                })
            })?)
            .await?;
    }

    scheduler.start().await?;
    tracing::info!("Scheduler started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down worker");
    Ok(())
}

/// Delete outbox rows that were delivered more than 30 days ago. Failed
/// rows are kept for inspection.
async fn prune_outbox(pool: &PgPool) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM email_outbox WHERE status = 'sent' AND sent_at < NOW() - INTERVAL '30 days'",
    )
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!(pruned = result.rows_affected(), "Pruned delivered outbox rows");
    }
    Ok(())
}

async fn ticket_counts(pool: &PgPool) -> Result<(i64, i64), sqlx::Error> {
    let (total, active): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE expiry_date > NOW()) FROM tickets",
    )
    .fetch_one(pool)
    .await?;
    Ok((total, active))
}
