// CLI saved-search commands: searches list|show|feed|add, run, new

use reqwest::Client;
use serde_json::{json, Value};

use super::jobs::print_jobs;
use super::{api_url, handle_request_error, read_response, truncate, FilterArgs};

fn print_search(search: &Value) {
    let field = |key: &str| search[key].as_str().unwrap_or("-").to_string();
    println!("Saved search '{}'", field("name"));
    println!("  Query:        {}", field("q"));
    println!("  Source:       {}", field("source"));
    println!("  Location:     {}", field("location"));
    println!("  Posted after: {}", field("posted_after"));
    println!("  Limit:        {}", search["limit"].as_u64().unwrap_or(0));
    println!("  Seen:         {}", search["seen_count"].as_u64().unwrap_or(0));
}

fn print_sweep(result: &Value) {
    let name = result["name"].as_str().unwrap_or("?");
    match result["error"].as_str() {
        Some(err) => println!("{:<20} FAILED: {}", truncate(name, 19), err),
        None => println!(
            "{:<20} {} new{}",
            truncate(name, 19),
            result["new_count"].as_u64().unwrap_or(0),
            if result["emailed"].as_bool().unwrap_or(false) {
                ", emailed"
            } else {
                ""
            }
        ),
    }
}

/// Attach `X-Cron-Secret` from the environment when one is set.
fn with_cron_secret(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match std::env::var("CRON_SECRET") {
        Ok(secret) if !secret.trim().is_empty() => request.header("X-Cron-Secret", secret),
        _ => request,
    }
}

/// jobc searches list
pub async fn cmd_list(host: &str, port: u16, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let response = client
        .get(api_url(host, port, &["api", "searches"])?)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let empty_vec = vec![];
    let searches = body.as_array().unwrap_or(&empty_vec);
    if searches.is_empty() {
        println!("No saved searches.");
        return Ok(());
    }

    println!("{:<20}{:<30}{:<20}{:<8}{:<8}", "NAME", "QUERY", "LOCATION", "LIMIT", "SEEN");
    for s in searches {
        println!(
            "{:<20}{:<30}{:<20}{:<8}{:<8}",
            truncate(s["name"].as_str().unwrap_or("?"), 19),
            truncate(s["q"].as_str().unwrap_or("-"), 29),
            truncate(s["location"].as_str().unwrap_or("-"), 19),
            s["limit"].as_u64().unwrap_or(0),
            s["seen_count"].as_u64().unwrap_or(0)
        );
    }
    Ok(())
}

/// jobc searches show
pub async fn cmd_show(host: &str, port: u16, name: &str) -> anyhow::Result<()> {
    let client = Client::new();
    let response = client
        .get(api_url(host, port, &["api", "searches", name])?)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;
    print_search(&body);
    Ok(())
}

/// jobc searches feed
pub async fn cmd_feed(
    host: &str,
    port: u16,
    name: &str,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let client = Client::new();
    let mut request = client.get(api_url(host, port, &["api", "searches", name, "feed"])?);
    if let Some(limit) = limit {
        request = request.query(&[("limit", limit)]);
    }
    let response = request
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let empty_vec = vec![];
    let items = body["items"].as_array().unwrap_or(&empty_vec);
    if items.is_empty() {
        println!("No jobs match '{}'.", name);
        return Ok(());
    }
    println!("{:<6}{:<40}{:<24}{:<20}", "SEEN", "TITLE", "COMPANY", "LOCATION");
    for item in items {
        let job = &item["job"];
        println!(
            "{:<6}{:<40}{:<24}{:<20}",
            if item["seen"].as_bool().unwrap_or(false) { "yes" } else { "new" },
            truncate(job["title"].as_str().unwrap_or("?"), 38),
            truncate(job["company"].as_str().unwrap_or("-"), 22),
            truncate(job["location"].as_str().unwrap_or("-"), 18)
        );
    }
    Ok(())
}

/// jobc searches add
pub async fn cmd_add(host: &str, port: u16, name: &str, filter: &FilterArgs) -> anyhow::Result<()> {
    let mut payload = json!({
        "name": name,
        "q": filter.q,
        "source": filter.source,
        "location": filter.location,
        "posted_after": filter.posted_after,
    });
    if let Some(limit) = filter.limit {
        payload["limit"] = json!(limit);
    }

    let client = Client::new();
    let response = client
        .post(api_url(host, port, &["api", "searches"])?)
        .json(&payload)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;
    print_search(&body);
    Ok(())
}

/// jobc run
pub async fn cmd_run(host: &str, port: u16, name: Option<&str>, all: bool) -> anyhow::Result<()> {
    let url = match (name, all) {
        (_, true) => api_url(host, port, &["api", "tasks", "run-all"])?,
        (Some(n), false) => api_url(host, port, &["api", "tasks", "searches", n, "run"])?,
        (None, false) => anyhow::bail!("Either a search name or --all must be given"),
    };

    let client = Client::new();
    let response = with_cron_secret(client.post(url))
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;

    if all {
        let empty_vec = vec![];
        for result in body["results"].as_array().unwrap_or(&empty_vec) {
            print_sweep(result);
        }
        println!(
            "Ran {} searches, {} failed.",
            body["ran"].as_u64().unwrap_or(0),
            body["failed"].as_u64().unwrap_or(0)
        );
    } else {
        print_sweep(&body);
    }
    Ok(())
}

/// jobc new
pub async fn cmd_new(host: &str, port: u16, name: &str, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let response = client
        .get(api_url(host, port, &["api", "searches", name, "new"])?)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "{} new jobs for '{}'",
        body["new_count"].as_u64().unwrap_or(0),
        name
    );
    print_jobs(body["new_jobs"].as_array().map(Vec::as_slice).unwrap_or(&[]));
    Ok(())
}

/// jobc new --count
pub async fn cmd_new_count(host: &str, port: u16, name: &str, json: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let response = client
        .get(api_url(host, port, &["api", "searches", name, "new-count"])?)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!(
            "{} new jobs for '{}'",
            body["new_count"].as_u64().unwrap_or(0),
            name
        );
    }
    Ok(())
}
