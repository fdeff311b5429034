//! Runs a query and a subscription against a subscriptions-transport-ws server.
//!
//! The endpoint defaults to `ws://localhost:4000/graphql`; pass another one as the first
//! argument. The subscription document can be given as the second argument.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info,graphql_subscriptions_client=debug cargo run --example subscribe --features tracing -- ws://localhost:4000/graphql
//! ```

use std::time::Duration;

use futures::StreamExt as _;
use graphql_subscriptions_client::graphql::{Client, Config, QueryPayload};
use serde_json::Map;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "ws://localhost:4000/graphql";
const DEFAULT_SUBSCRIPTION: &str = "subscription { counter }";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let endpoint = args.next().unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
    let subscription = args
        .next()
        .unwrap_or_else(|| DEFAULT_SUBSCRIPTION.to_owned());

    let config = Config::builder()
        .ack_timeout(Duration::from_secs(5))
        .build();
    let client = Client::new(&endpoint, config)?;
    info!(%endpoint, state = ?client.connection_state(), "Client created");

    // Introspect the schema's query type name
    let payload = QueryPayload::builder()
        .query("query TypeName { __schema { queryType { name } } }")
        .operation_name("TypeName")
        .build();
    let mut query = client.execute(payload);
    while let Some(result) = query.next().await {
        match result {
            Ok(response) => info!(operation = "TypeName", data = ?response.data),
            Err(e) => warn!(operation = "TypeName", error = %e),
        }
    }

    info!(operation = "subscription", %subscription, "Subscribing");
    let mut stream = client.execute_query(subscription, Map::new());
    let mut count = 0;

    while let Ok(Some(result)) = timeout(Duration::from_secs(10), stream.next()).await {
        match result {
            Ok(response) => {
                info!(
                    operation = "subscription",
                    id = ?stream.id(),
                    data = ?response.data,
                    errors = response.errors.len()
                );
                count += 1;
                if count >= 5 {
                    break;
                }
            }
            Err(e) => {
                warn!(operation = "subscription", error = %e, kind = ?e.kind());
                break;
            }
        }
    }
    info!(operation = "subscription", received = count);

    // Dropping the stream would do the same
    stream.cancel();
    debug!(
        operation = "subscription",
        state = ?stream.state(),
        active = client.operation_count()
    );

    Ok(())
}
