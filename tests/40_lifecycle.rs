mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use reqwest::StatusCode;
use tokio::net::TcpListener;

use common::{budget, launch, test_config};
use staffgate::database::MemoryDatabase;
use staffgate::lifecycle::{
    start, Completion, Lifecycle, LifecycleError, LifecycleState, ShutdownNotice,
};

fn sleeping_router(delay: Duration) -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route(
            "/slow",
            get(move || async move {
                tokio::time::sleep(delay).await;
                "done"
            }),
        )
}

#[tokio::test]
async fn serves_until_notified_then_completes_once() -> Result<()> {
    let db = Arc::new(MemoryDatabase::new());
    let server = launch(
        sleeping_router(Duration::ZERO),
        db.clone(),
        budget(Duration::from_secs(5), Duration::from_secs(1)),
    )
    .await?;
    assert_eq!(server.lifecycle.current(), LifecycleState::Serving);

    let client = reqwest::Client::new();
    let res = client.get(format!("{}/ping", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await?, "pong");

    // Two notices in quick succession
    server.notices.send(ShutdownNotice::Interrupt).await?;
    server.notices.send(ShutdownNotice::Terminate).await?;

    let completion = tokio::time::timeout(Duration::from_secs(10), server.done).await??;
    assert_eq!(
        completion,
        Completion {
            drained: true,
            connection_closed: true
        }
    );
    assert_eq!(db.close_calls(), 1);
    assert!(db.is_closed());
    assert_eq!(server.lifecycle.current(), LifecycleState::Stopped);

    // Listener is gone
    let fresh = reqwest::Client::new();
    assert!(fresh
        .get(format!("{}/ping", server.base_url))
        .send()
        .await
        .is_err());
    Ok(())
}

#[tokio::test]
async fn in_flight_request_finishes_during_drain() -> Result<()> {
    let db = Arc::new(MemoryDatabase::new());
    let server = launch(
        sleeping_router(Duration::from_millis(300)),
        db.clone(),
        budget(Duration::from_secs(5), Duration::from_secs(1)),
    )
    .await?;

    let url = format!("{}/slow", server.base_url);
    let in_flight = tokio::spawn(async move { reqwest::get(url).await?.text().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.notices.send(ShutdownNotice::Terminate).await?;

    assert_eq!(in_flight.await??, "done");
    let completion = tokio::time::timeout(Duration::from_secs(10), server.done).await??;
    assert!(completion.drained);
    assert!(completion.connection_closed);
    assert_eq!(db.close_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn drain_timeout_bounds_teardown() -> Result<()> {
    let db = Arc::new(MemoryDatabase::new());
    let server = launch(
        sleeping_router(Duration::from_secs(60)),
        db.clone(),
        budget(Duration::from_millis(200), Duration::from_secs(1)),
    )
    .await?;

    let url = format!("{}/slow", server.base_url);
    let stuck = tokio::spawn(async move { reqwest::get(url).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    server.notices.send(ShutdownNotice::Interrupt).await?;
    let completion = tokio::time::timeout(Duration::from_secs(10), server.done).await??;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!completion.drained);
    assert!(completion.connection_closed);
    assert_eq!(db.close_calls(), 1);
    assert!(!stuck.is_finished());
    stuck.abort();
    Ok(())
}

#[tokio::test]
async fn slow_close_is_bounded_and_reported() -> Result<()> {
    let db = Arc::new(MemoryDatabase::new().with_close_delay(Duration::from_secs(30)));
    let server = launch(
        sleeping_router(Duration::ZERO),
        db.clone(),
        budget(Duration::from_secs(1), Duration::from_millis(100)),
    )
    .await?;

    server.notices.send(ShutdownNotice::Terminate).await?;
    let completion = tokio::time::timeout(Duration::from_secs(5), server.done).await??;
    assert!(completion.drained);
    assert!(!completion.connection_closed);
    assert_eq!(db.close_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn closed_notice_source_never_completes() -> Result<()> {
    let db = Arc::new(MemoryDatabase::new());
    let server = launch(
        sleeping_router(Duration::ZERO),
        db.clone(),
        budget(Duration::from_secs(1), Duration::from_secs(1)),
    )
    .await?;

    drop(server.notices);
    let result = tokio::time::timeout(Duration::from_secs(5), server.done).await?;
    assert!(result.is_err());
    assert_eq!(db.close_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn startup_binds_the_configured_port() -> Result<()> {
    let port = portpicker::pick_unused_port().context("no free port")?;
    let config = test_config(&[("PORT", &port.to_string())]);
    let lifecycle = Lifecycle::new();

    let started = start(&config, &lifecycle).await?;
    assert_eq!(started.listener.local_addr()?.port(), port);
    assert_eq!(lifecycle.current(), LifecycleState::Starting);
    Ok(())
}

#[tokio::test]
async fn occupied_port_is_a_fatal_bind_error() -> Result<()> {
    let port = portpicker::pick_unused_port().context("no free port")?;
    let _occupied = TcpListener::bind(("0.0.0.0", port)).await?;
    let config = test_config(&[("PORT", &port.to_string())]);

    let err = match start(&config, &Lifecycle::new()).await {
        Ok(_) => anyhow::bail!("bind on an occupied port should fail"),
        Err(err) => err,
    };
    match err {
        LifecycleError::Bind { addr, .. } => assert_eq!(addr.port(), port),
        other => anyhow::bail!("expected a bind error, got {}", other),
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_database_is_a_fatal_connect_error() -> Result<()> {
    let db_port = portpicker::pick_unused_port().context("no free port")?;
    let url = format!("postgres://staff@127.0.0.1:{}/staffgate", db_port);
    let config = test_config(&[
        ("STORAGE_BACKEND", "postgres"),
        ("DATABASE_URL", &url),
        ("DATABASE_CONNECTION_TIMEOUT", "1"),
    ]);

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        start(&config, &Lifecycle::new()),
    )
    .await?;
    assert!(matches!(result, Err(LifecycleError::Connect(_))));
    Ok(())
}
