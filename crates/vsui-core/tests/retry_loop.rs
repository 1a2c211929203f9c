//! Retry-Action Loop against a scripted menu that shows a loading
//! placeholder for a number of openings.

mod common;

use std::time::Duration;

use common::{busy_menu_driver, ide, menu_item, BUSY, ENTRY, MENU, READY};

use vsui_core::condition::element_absent;
use vsui_core::driver::UiDriver;
use vsui_core::memory::{DriverCall, MemoryDriver};
use vsui_core::retry::{open_menu_entry, retry_action, RetryOptions, RetryOutcome};
use vsui_core::wait::{WaitError, WaitOptions};

fn options(max_cycles: u32) -> RetryOptions {
    RetryOptions {
        settle: WaitOptions::from_millis(2000).interval(Duration::from_millis(250)),
        backoff: Duration::from_millis(1000),
        max_cycles,
    }
}

async fn clicks_on(driver: &MemoryDriver, text: &str) -> usize {
    let target = menu_item(text).describe();
    driver
        .calls()
        .await
        .iter()
        .filter(|c| matches!(c, DriverCall::Click { .. }) && c.target() == target)
        .count()
}

async fn open_tools_menu(driver: &MemoryDriver, opts: RetryOptions) -> Result<RetryOutcome, WaitError> {
    open_menu_entry(driver, &ide(), &menu_item(MENU), &menu_item(ENTRY), &menu_item(BUSY), opts).await
}

#[tokio::test(start_paused = true)]
async fn test_not_busy_needs_zero_cycles() {
    let driver = busy_menu_driver(0).await;

    let outcome = open_tools_menu(&driver, options(20)).await.unwrap();

    assert_eq!(outcome, RetryOutcome::Cleared { cycles: 0 });
    assert_eq!(clicks_on(&driver, MENU).await, 1);
    assert_eq!(clicks_on(&driver, ENTRY).await, 1);
    assert!(driver.exists(&ide(), &menu_item(READY)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_busy_for_two_openings_needs_two_cycles() {
    let driver = busy_menu_driver(2).await;

    let start = tokio::time::Instant::now();
    let outcome = open_tools_menu(&driver, options(20)).await.unwrap();

    assert_eq!(outcome, RetryOutcome::Cleared { cycles: 2 });
    // One opening per attempt plus one closing per cycle.
    assert_eq!(clicks_on(&driver, MENU).await, 3 + 2);
    assert_eq!(clicks_on(&driver, ENTRY).await, 3);
    assert!(driver.exists(&ide(), &menu_item(READY)).await.unwrap());
    assert!(!driver.exists(&ide(), &menu_item(BUSY)).await.unwrap());
    // Two full settle budgets and two backoffs.
    assert_eq!(start.elapsed(), Duration::from_millis(2 * 2000 + 2 * 1000));
}

#[tokio::test(start_paused = true)]
async fn test_gestures_alternate_open_and_dismiss() {
    let driver = busy_menu_driver(1).await;

    open_tools_menu(&driver, options(20)).await.unwrap();

    let targets: Vec<String> = driver.calls().await.iter().map(|c| c.target().to_string()).collect();
    let menu = menu_item(MENU).describe();
    let entry = menu_item(ENTRY).describe();
    assert_eq!(targets, vec![menu.clone(), entry.clone(), menu.clone(), menu, entry]);
}

#[tokio::test(start_paused = true)]
async fn test_permanently_busy_menu_is_exhausted() {
    let driver = busy_menu_driver(u32::MAX).await;

    let outcome = open_tools_menu(&driver, options(3)).await.unwrap();

    assert_eq!(outcome, RetryOutcome::Exhausted { cycles: 3 });
    assert_eq!(clicks_on(&driver, ENTRY).await, 4);
    // Every attempt is followed by a dismiss, the last one included.
    assert_eq!(clicks_on(&driver, MENU).await, 8);
    assert!(!driver.exists(&ide(), &menu_item(ENTRY)).await.unwrap());

    let err = outcome.into_result("Qt VS Tools menu").unwrap_err();
    assert_eq!(err.to_string(), "Qt VS Tools menu still busy after 3 retries");
}

#[tokio::test(start_paused = true)]
async fn test_missing_menu_aborts_with_driver_error() {
    let driver = MemoryDriver::new();
    driver.add_context(ide(), vec![]).await;

    let err = open_tools_menu(&driver, options(20)).await.unwrap_err();

    assert!(matches!(err, WaitError::Driver(_)));
    assert!(driver.calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_generic_loop_with_driver_gestures() {
    let driver = busy_menu_driver(1).await;
    let ctx = ide();
    let busy = menu_item(BUSY);
    let cleared = element_absent(&driver, &ctx, &busy);
    let (driver_ref, ctx_ref) = (&driver, &ctx);

    let outcome = retry_action(
        &cleared,
        || async move {
            driver_ref.click(ctx_ref, &menu_item(MENU)).await?;
            driver_ref.click(ctx_ref, &menu_item(ENTRY)).await
        },
        || async move { driver_ref.click(ctx_ref, &menu_item(MENU)).await },
        options(5),
    )
    .await
    .unwrap();

    assert_eq!(outcome.cycles(), 1);
    assert!(outcome.is_cleared());
}
