//! `routers` and `directory` commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct RouterInfo {
    id: String,
    position: [f64; 2],
    #[serde(default)]
    prefix: String,
    host: String,
    #[serde(default)]
    ipv4: bool,
    #[serde(default)]
    ipv6: bool,
    #[serde(default, rename = "udp-port")]
    udp_port: u16,
    #[serde(default, rename = "wss-port")]
    wss_port: u16,
    #[serde(default, rename = "http3-port")]
    http3_port: u16,
}

#[derive(Deserialize)]
struct AvailInfo {
    #[serde(flatten)]
    router: RouterInfo,
    available: Vec<String>,
}

fn families(r: &RouterInfo) -> &'static str {
    match (r.ipv4, r.ipv6) {
        (true, true) => "v4+v6",
        (true, false) => "v4",
        (false, true) => "v6",
        (false, false) => "-",
    }
}

pub async fn cmd_routers(port: u16) -> Result<()> {
    let routers: Vec<AvailInfo> = get_json(&format!("{}/routers.json", base_url(port))).await?;

    let up = routers.iter().filter(|r| !r.available.is_empty()).count();
    println!("═══════════════════════════════════════");
    println!("  Router Availability ({}/{} up)", up, routers.len());
    println!("═══════════════════════════════════════");

    for r in &routers {
        let available = if r.available.is_empty() {
            "unavailable".to_string()
        } else {
            r.available.join(", ")
        };
        println!("  {:<28} {}", r.router.id, available);
    }
    Ok(())
}

pub async fn cmd_directory(port: u16) -> Result<()> {
    let routers: Vec<RouterInfo> =
        get_json(&format!("{}/routerlist.json", base_url(port))).await?;

    if routers.is_empty() {
        println!("No routers known.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Known Routers ({})", routers.len());
    println!("═══════════════════════════════════════");

    for r in &routers {
        println!("  ┌─ {}", r.id);
        println!("  │  host     : {} ({})", r.host, families(r));
        println!("  │  prefix   : {}", r.prefix);
        println!("  │  position : {:.4}, {:.4}", r.position[0], r.position[1]);
        println!(
            "  └─ ports    : udp {} / wss {} / http3 {}",
            r.udp_port, r.wss_port, r.http3_port
        );
    }
    Ok(())
}
