// CLI daemon commands: serve, status

use reqwest::Client;

use super::{base_url, handle_request_error, read_response};

/// jobc serve
pub async fn cmd_serve(
    host: &str,
    config: Option<&str>,
    port_override: Option<u16>,
    data_dir: Option<&str>,
) -> anyhow::Result<()> {
    let config_path = config.map(std::path::Path::new);
    let data_dir_path = data_dir.map(std::path::Path::new);

    // Only a non-default global --host overrides the config file.
    let host_override = if host != "127.0.0.1" {
        Some(host)
    } else {
        None
    };

    crate::daemon::start_daemon(config_path, data_dir_path, host_override, port_override).await
}

/// jobc status
pub async fn cmd_status(host: &str, port: u16, verbose: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/health", base_url(host, port));

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;
    let body = read_response(response).await?;

    let daemon_status = body["status"].as_str().unwrap_or("unknown");
    let version = body["version"].as_str().unwrap_or("unknown");
    let uptime = body["uptime_seconds"].as_u64().unwrap_or(0);
    let total_jobs = body["total_jobs"].as_u64().unwrap_or(0);
    let saved = body["saved_searches"].as_u64().unwrap_or(0);
    let sources: Vec<&str> = body["sources"]
        .as_array()
        .map(|a| a.iter().filter_map(|s| s.as_str()).collect())
        .unwrap_or_default();

    println!("Collector Status: {}", daemon_status);
    println!("  API:         http://{}:{}", host, port);
    println!("  Jobs:        {}", total_jobs);
    println!("  Searches:    {}", saved);
    println!(
        "  Sources:     {}",
        if sources.is_empty() {
            "none configured".to_string()
        } else {
            sources.join(", ")
        }
    );
    println!("  Uptime:      {}", format_uptime(uptime));
    println!("  Version:     {}", version);

    if verbose {
        println!("\nRaw response:");
        println!("{}", serde_json::to_string_pretty(&body)?);
    }

    Ok(())
}

/// Format uptime seconds into a human-readable string.
fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, mins, secs)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
