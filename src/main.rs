use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use openkeyval::{ClientConfig, StoreClient};

const USAGE: &str = "\
Usage: okv [--compress] <command> [args]

Commands:
  set <key> <text>       store a string value
  set-json <key> <json>  store a JSON value
  get <key>              print the value stored under key
  delete <key>           overwrite key with an empty value
  demo                   save, read back and delete a sample record

Environment: OKV_BASE_URL, OKV_TIMEOUT_MS, OKV_COMPRESSION_LEVEL, RUST_LOG";

#[derive(Debug, Serialize, Deserialize)]
struct PostInfo {
    post_id: u32,
    data: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let compress = match args.iter().position(|a| a == "--compress" || a == "-c") {
        Some(idx) => {
            args.remove(idx);
            true
        }
        None => false,
    };

    // Load configuration
    let config = ClientConfig::from_env()
        .map_err(|e| format!("Configuration error: {}", e))?;
    let client = StoreClient::with_config(config)?;
    info!("Using {}", client.base_url());

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["set", key, text] => {
            let reply = client.save_string(key, text, compress).await?;
            println!("{}", reply);
        }
        ["set-json", key, json] => {
            let value: Value = serde_json::from_str(json)
                .map_err(|e| format!("Invalid JSON value: {}", e))?;
            let reply = client.save(key, &value, compress).await?;
            println!("{}", reply);
        }
        ["get", key] => match client.get_optional::<Value>(key, compress).await? {
            Some(Value::String(text)) => println!("{}", text),
            Some(value) => println!("{}", value),
            None => info!("Key {} is not set", key),
        },
        ["delete", key] => {
            let reply = client.delete(key).await?;
            println!("{}", reply);
        }
        ["demo"] => run_demo(&client, compress).await?,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn run_demo(client: &StoreClient, compress: bool) -> Result<(), openkeyval::Error> {
    let key = format!("okv-demo-{}-1", std::process::id());
    let post = PostInfo {
        post_id: 3,
        data: "Here is our test.".to_string(),
    };

    info!("Saving {} (compress: {})", key, compress);
    client.save(&key, &post, compress).await?;

    let fetched: PostInfo = client.get(&key, compress).await?;
    println!("PostID: '{}', Data: '{}'", fetched.post_id, fetched.data);

    client.delete(&key).await?;
    let after = client.get_string(&key, false).await?;
    info!("After delete: {:?}", after);

    Ok(())
}
