use crate::*;

#[tokio::test]
async fn test_prober_outage_keeps_previous_bits() -> Result<()> {
    let stack = Stack::start().await?;

    let prober = start_prober(&["berlin"]).await?;
    let first = stack.refresher(&prober)?.refresh_once().await?;

    // Every probe now fails at the transport level: no verdicts, bits stay.
    let second = stack.refresher(&dead_uri().await?)?.refresh_once().await?;
    assert!(second.updated > first.updated);
    for (a, b) in first.routers.iter().zip(&second.routers) {
        assert_eq!(a.id(), b.id());
        assert_eq!(a.available, b.available);
    }

    // The query still answers from the carried-forward state.
    let text = get(&stack.url("/?lon=13.4&lat=52.5"), None).await?.text().await?;
    assert_eq!(text, "paris.example.net\n");
    Ok(())
}

#[tokio::test]
async fn test_router_recovers_on_next_cycle() -> Result<()> {
    let stack = Stack::start().await?;

    let outage = start_prober(&["paris", "tokyo", "berlin"]).await?;
    let first = stack.refresher(&outage)?.refresh_once().await?;
    assert!(first.routers.iter().all(|r| r.count_available() == 0));

    let resp = get(&stack.url("/"), None).await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await?, "\n");

    let healthy = start_prober(&[]).await?;
    let second = stack.refresher(&healthy)?.refresh_once().await?;
    assert!(second.routers.iter().all(|r| r.count_available() == 2));

    let resp = get(&stack.url("/?k=3&lon=13.4&lat=52.5"), Some("application/json")).await?;
    let body: serde_json::Value = resp.json().await?;
    let ids: Vec<&str> = body["routers"]
        .as_array()
        .context("routers array")?
        .iter()
        .filter_map(|r| r["prefix"].as_str())
        .collect();
    assert_eq!(ids, ["/ndn/berlin", "/ndn/paris", "/ndn/tokyo"]);
    Ok(())
}
