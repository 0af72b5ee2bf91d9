use crate::*;

#[tokio::test]
async fn test_unavailable_before_first_cycle() -> Result<()> {
    let stack = Stack::start().await?;

    let resp = get(&stack.url("/?cap=udp"), None).await?;
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers()["retry-after"], "60");

    let resp = get(&stack.url("/routers.json"), None).await?;
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    // The directory is served regardless.
    let list: serde_json::Value = get(&stack.url("/routerlist.json"), None).await?.json().await?;
    assert_eq!(list.as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn test_query_json_after_cycle() -> Result<()> {
    let stack = Stack::start().await?;
    let prober = start_prober(&["berlin"]).await?;
    let snapshot = stack.refresher(&prober)?.refresh_once().await?;

    let resp = get(
        &stack.url("/?cap=udp&k=3&lon=2.35&lat=48.85"),
        Some("application/json"),
    )
    .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.headers()["last-modified"], snapshot.http_date().as_str());
    assert!(resp.headers()["content-type"]
        .to_str()?
        .starts_with("application/json"));

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["updated"], snapshot.updated_millis());
    let routers = body["routers"].as_array().context("routers array")?;
    let connects: Vec<&str> = routers.iter().filter_map(|r| r["connect"].as_str()).collect();
    assert_eq!(connects, ["paris.example.net:6363", "tokyo.example.net:6363"]);
    assert_eq!(routers[0]["transport"], "udp");
    assert_eq!(routers[0]["prefix"], "/ndn/paris");
    Ok(())
}

#[tokio::test]
async fn test_query_text_uses_legacy_syntax() -> Result<()> {
    let stack = Stack::start().await?;
    let prober = start_prober(&["berlin"]).await?;
    stack.refresher(&prober)?.refresh_once().await?;

    let resp = get(&stack.url("/?cap=wss&cap=udp&k=1&lon=139.7&lat=35.7"), None).await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()?
        .starts_with("text/plain"));
    assert_eq!(resp.text().await?, "tokyo.example.net,tokyo.example.net\n");

    let resp = get(&stack.url("/?cap=wss&k=1&lon=139.7&lat=35.7"), Some("application/json")).await?;
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["routers"][0]["connect"], "wss://tokyo.example.net:443/ws/");
    Ok(())
}

#[tokio::test]
async fn test_routers_json_reports_verdicts() -> Result<()> {
    let stack = Stack::start().await?;
    let prober = start_prober(&["berlin"]).await?;
    let snapshot = stack.refresher(&prober)?.refresh_once().await?;

    let resp = get(&stack.url("/routers.json"), None).await?;
    assert_eq!(resp.headers()["last-modified"], snapshot.http_date().as_str());
    let routers: serde_json::Value = resp.json().await?;
    let routers = routers.as_array().context("routers array")?;
    assert_eq!(routers.len(), 3);

    let by_id = |id: &str| {
        routers
            .iter()
            .find(|r| r["id"] == id)
            .map(|r| r["available"].clone())
    };
    assert_eq!(by_id("paris"), Some(serde_json::json!(["udp4", "wss-ipv4"])));
    assert_eq!(by_id("berlin"), Some(serde_json::json!([])));
    Ok(())
}

#[tokio::test]
async fn test_robots_and_cors() -> Result<()> {
    let stack = Stack::start().await?;

    let body = get(&stack.url("/robots.txt"), None).await?.text().await?;
    assert_eq!(body, "User-Agent: *\nDisallow: /\n");

    let resp = reqwest::Client::new()
        .get(stack.url("/routerlist.json"))
        .header(reqwest::header::ORIGIN, "https://example.org")
        .send()
        .await?;
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    Ok(())
}
