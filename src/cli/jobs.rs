// CLI job commands: ingest, jobs, search, dashboard

use reqwest::Client;
use serde_json::{json, Value};

use super::{api_url, handle_request_error, read_response, truncate, FilterArgs};

/// Print jobs as a fixed-width table.
pub fn print_jobs(jobs: &[Value]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }

    println!(
        "{:<12}{:<40}{:<24}{:<20}{:<12}",
        "SOURCE", "TITLE", "COMPANY", "LOCATION", "POSTED"
    );
    for job in jobs {
        let posted = job["posted_at"]
            .as_str()
            .map(|ts| ts.chars().take(10).collect::<String>())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12}{:<40}{:<24}{:<20}{:<12}",
            job["source"].as_str().unwrap_or("?"),
            truncate(job["title"].as_str().unwrap_or("?"), 38),
            truncate(job["company"].as_str().unwrap_or("-"), 22),
            truncate(job["location"].as_str().unwrap_or("-"), 18),
            posted
        );
    }
}

fn print_jobs_body(body: &Value, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(body)?);
    } else {
        print_jobs(body.as_array().map(Vec::as_slice).unwrap_or(&[]));
    }
    Ok(())
}

/// Query-string pairs for the non-empty filter flags.
pub fn filter_query(filter: &FilterArgs) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(ref q) = filter.q {
        params.push(("q", q.clone()));
    }
    if let Some(ref source) = filter.source {
        params.push(("source", source.clone()));
    }
    if let Some(ref location) = filter.location {
        params.push(("location", location.clone()));
    }
    if let Some(ref posted_after) = filter.posted_after {
        params.push(("posted_after", posted_after.clone()));
    }
    if let Some(limit) = filter.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

/// jobc ingest
pub async fn cmd_ingest(
    host: &str,
    port: u16,
    keywords: &str,
    location: Option<&str>,
    source: Option<&str>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let client = Client::new();
    let url = match source {
        Some(s) => api_url(host, port, &["api", "ingest", s])?,
        None => api_url(host, port, &["api", "ingest"])?,
    };
    let payload = json!({
        "keywords": keywords,
        "location": location,
        "limit": limit,
    });

    let response = client
        .post(url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;

    if let Some(sources) = body["sources"].as_object() {
        for (name, result) in sources {
            println!(
                "{:<10} fetched {:>4}, changed {:>4}",
                name,
                result["fetched"].as_u64().unwrap_or(0),
                result["affected"].as_u64().unwrap_or(0)
            );
        }
    }
    println!(
        "Total jobs in store: {}",
        body["total_in_store"].as_u64().unwrap_or(0)
    );
    Ok(())
}

/// jobc jobs
pub async fn cmd_jobs(
    host: &str,
    port: u16,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let client = Client::new();
    let mut request = client.get(api_url(host, port, &["api", "jobs"])?);
    if let Some(l) = limit {
        request = request.query(&[("limit", l)]);
    }

    let response = request
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;
    print_jobs_body(&body, json)
}

/// jobc search
pub async fn cmd_search(
    host: &str,
    port: u16,
    filter: &FilterArgs,
    json: bool,
) -> anyhow::Result<()> {
    let client = Client::new();
    let response = client
        .get(api_url(host, port, &["api", "jobs", "search"])?)
        .query(&filter_query(filter))
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;
    print_jobs_body(&body, json)
}

/// jobc dashboard
pub async fn cmd_dashboard(
    host: &str,
    port: u16,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let client = Client::new();
    let mut request = client.get(api_url(host, port, &["api", "dashboard"])?);
    if let Some(l) = limit {
        request = request.query(&[("limit_jobs", l)]);
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

    println!(
        "Jobs in store:  {}",
        body["stats"]["total_jobs"].as_u64().unwrap_or(0)
    );
    println!(
        "Saved searches: {}",
        body["stats"]["search_count"].as_u64().unwrap_or(0)
    );
    if let Some(searches) = body["searches"].as_array() {
        for s in searches {
            println!(
                "  {:<20} {} seen",
                truncate(s["name"].as_str().unwrap_or("?"), 19),
                s["seen_count"].as_u64().unwrap_or(0)
            );
        }
    }
    println!();
    print_jobs(body["latest_jobs"].as_array().map(Vec::as_slice).unwrap_or(&[]));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_skips_missing_flags() {
        let filter = FilterArgs {
            q: Some("rust".to_string()),
            limit: Some(10),
            ..Default::default()
        };
        let params = filter_query(&filter);
        assert_eq!(
            params,
            vec![("q", "rust".to_string()), ("limit", "10".to_string())]
        );
        assert!(filter_query(&FilterArgs::default()).is_empty());
    }

    #[tokio::test]
    async fn test_cmd_jobs_connection_error() {
        let err = cmd_jobs("127.0.0.1", 1, None, false).await.unwrap_err();
        assert!(err.to_string().contains("Could not connect"));
    }
}
