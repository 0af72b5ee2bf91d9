//! `query` command: ask fchd for the closest routers.

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use super::http::{base_url, get_json, get_text};

#[derive(Deserialize)]
struct QueryResponse {
    updated: i64,
    routers: Vec<QueryRouter>,
}

#[derive(Deserialize)]
struct QueryRouter {
    transport: String,
    connect: String,
    #[serde(default)]
    prefix: String,
}

#[derive(Debug, Default, PartialEq)]
struct QueryArgs {
    caps: Vec<String>,
    counts: Vec<String>,
    lon: Option<String>,
    lat: Option<String>,
    network: Option<String>,
    no_ipv4: bool,
    no_ipv6: bool,
    json: bool,
}

fn parse_args(args: &[&str]) -> Result<QueryArgs> {
    let mut parsed = QueryArgs::default();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let mut value = |name: &str| -> Result<String> {
            it.next()
                .map(|v| v.to_string())
                .with_context(|| format!("{} requires a value", name))
        };
        match *arg {
            "--cap" => parsed.caps.push(value("--cap")?),
            "--k" => parsed.counts.push(value("--k")?),
            "--lon" => parsed.lon = Some(value("--lon")?),
            "--lat" => parsed.lat = Some(value("--lat")?),
            "--network" => parsed.network = Some(value("--network")?),
            "--no-ipv4" => parsed.no_ipv4 = true,
            "--no-ipv6" => parsed.no_ipv6 = true,
            "--json" => parsed.json = true,
            other => bail!("unknown query option: {}", other),
        }
    }
    Ok(parsed)
}

fn query_string(args: &QueryArgs) -> String {
    let mut qs = url::form_urlencoded::Serializer::new(String::new());
    for cap in &args.caps {
        qs.append_pair("cap", cap);
    }
    for k in &args.counts {
        qs.append_pair("k", k);
    }
    if let Some(lon) = &args.lon {
        qs.append_pair("lon", lon);
    }
    if let Some(lat) = &args.lat {
        qs.append_pair("lat", lat);
    }
    if let Some(network) = &args.network {
        qs.append_pair("network", network);
    }
    if args.no_ipv4 {
        qs.append_pair("ipv4", "0");
    }
    if args.no_ipv6 {
        qs.append_pair("ipv6", "0");
    }
    qs.finish()
}

pub async fn cmd_query(port: u16, args: &[&str]) -> Result<()> {
    let args = parse_args(args)?;
    let url = format!("{}/?{}", base_url(port), query_string(&args));

    if !args.json {
        print!("{}", get_text(&url).await?);
        return Ok(());
    }

    let resp: QueryResponse = get_json(&url).await?;
    if resp.routers.is_empty() {
        println!("No matching routers.");
        return Ok(());
    }

    println!("Updated: {} ms since epoch", resp.updated);
    for r in &resp.routers {
        println!("  {:<6} {:<45} {}", r.transport, r.connect, r.prefix);
    }
    Ok(())
}
