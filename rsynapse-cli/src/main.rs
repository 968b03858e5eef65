use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::{Value, json};
use zbus::{Connection, proxy};

#[proxy(
    interface = "org.rsynapse.Engine1",
    default_service = "com.rsynapse.Engine",
    default_path = "/org/rsynapse/Engine1"
)]
trait Engine {
    async fn request(&self, payload: &str) -> zbus::Result<String>;

    #[zbus(signal)]
    fn response(&self, payload: &str) -> zbus::Result<()>;
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search all plugins and print results as they arrive
    Query {
        /// The search term
        query: String,
    },
    /// Trigger an action on a result from an earlier query
    Action {
        /// Result id
        id: String,
        /// Action id; the default action runs when omitted
        #[arg(long)]
        action: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let connection = Connection::session().await?;
    let proxy = EngineProxy::new(&connection).await?;

    match args.command {
        Command::Query { query } => {
            let params = json!({ "query": &query });
            let mut printed = 0;
            run(&proxy, "Query", params, |response| {
                let results = response["data"].as_array().cloned().unwrap_or_default();
                if results.is_empty() {
                    if printed == 0 {
                        println!("No results found for '{}'", query);
                    }
                    return false;
                }
                if printed == 0 {
                    println!("Results for '{}':", query);
                }
                for item in results {
                    printed += 1;
                    println!(
                        "- {} ({}) [{}]",
                        item["title"].as_str().unwrap_or_default(),
                        item["subtitle"].as_str().unwrap_or_default(),
                        item["id"].as_str().unwrap_or_default()
                    );
                }
                true
            })
            .await
        }
        Command::Action { id, action } => {
            let mut params = json!({ "id": id });
            if let Some(action) = action {
                params["actionId"] = Value::String(action);
            }
            run(&proxy, "Action", params, |_| {
                println!("Action executed");
                false
            })
            .await
        }
    }
}

/// Sends one request and feeds its successful responses to `on_success`
/// until it returns `false` or an error arrives.
async fn run<F>(proxy: &EngineProxy<'_>, method: &str, params: Value, mut on_success: F) -> Result<()>
where
    F: FnMut(&Value) -> bool,
{
    // Subscribe before sending so no response is missed.
    let mut responses = proxy.receive_response().await?;
    let payload = json!({ "method": method, "params": params }).to_string();
    let request_id = proxy.request(&payload).await?;
    if request_id.is_empty() {
        bail!("daemon rejected the request");
    }

    while let Some(signal) = responses.next().await {
        let args = signal.args()?;
        let response: Value = serde_json::from_str(args.payload())?;
        if response["id"].as_str() != Some(request_id.as_str()) {
            continue;
        }
        if response["success"] != true {
            bail!("{}", response["error"].as_str().unwrap_or("request failed"));
        }
        if !on_success(&response) {
            break;
        }
    }
    Ok(())
}
