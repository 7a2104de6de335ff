//! Basic example demonstrating typed calls against the Stream API.
//!
//! This example shows how to:
//! - Configure a client from the environment
//! - Fetch a resource through a path template
//! - Send a JSON body and read rate limit data from the response
//! - Tell API errors apart from cancellation
//!
//! Run with:
//! `STREAM_API_KEY=... STREAM_AUTH_TOKEN=... cargo run --example basic_call`

use http::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stream_dispatch::{CallContext, ClientBuilder, Error, Operation};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct AppResponse {
    app: serde_json::Value,
    duration: String,
}

#[derive(Debug, Serialize)]
struct UpsertUsers {
    users: serde_json::Value,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("stream_dispatch=debug,basic_call=info")
        .init();

    let client = ClientBuilder::from_env()?.build()?;
    let ctx = CallContext::with_timeout(Duration::from_secs(10));

    println!("=== GET Request Example ===");
    let response = client
        .get::<AppResponse>(&ctx, "app", &[] as &[&str])
        .await?;
    println!("App settings: {}", response.data.app);
    println!("Request latency: {:?}", response.latency);
    println!("Rate limit: {:?}", response.rate_limit);
    println!();

    println!("=== POST Request Example ===");
    let op = Operation::new(Method::POST, "users").json(&UpsertUsers {
        users: serde_json::json!({ "demo-user": { "id": "demo-user", "name": "Demo" } }),
    })?;
    match client.call::<serde_json::Value>(&ctx, op).await {
        Ok(response) => {
            println!("Upserted: {}", response.data);
            println!("Remaining quota: {:?}", response.rate_limit.remaining);
        }
        Err(Error::Api(api)) => {
            println!("API error {} ({}): {}", api.code, api.status_code, api.message);
            if let Some(fields) = &api.exception_fields {
                for (field, detail) in fields {
                    println!("  {field}: {detail}");
                }
            }
        }
        Err(e) if e.is_cancelled() => println!("Gave up: {e}"),
        Err(e) => return Err(e),
    }

    Ok(())
}
