//! njall: Njall CLI client
//!
//! Test interface for njalld.

use std::io::{self, IsTerminal, Read};
use std::time::Duration;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use njall::client::ServiceClient;
use njall::proto::{StringValue, unpack_any};

/// Njall CLI client
#[derive(Parser)]
#[command(name = "njall")]
#[command(version = njall::PKG_VERSION)]
#[command(about = "Njall message service client")]
struct Args {
    /// Server address
    #[arg(
        short,
        long,
        env = "NJALL_ADDRESS",
        default_value = "http://127.0.0.1:9090"
    )]
    address: String,

    /// Request deadline in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check service health
    Health {
        /// Service name (empty for the whole server)
        #[arg(default_value = "")]
        service: String,
    },

    /// Fetch the greeting message
    Message,

    /// Echo text through the Greet method
    Greet {
        /// Text to send (or omit to read from stdin)
        text: Option<String>,
    },

    /// Look up a WebFinger resource
    Webfinger {
        /// Resource, e.g. acct:alice@example.org
        resource: String,
    },

    /// Call any method with a raw protobuf payload
    Call {
        /// Method name, e.g. Greet
        method: String,
        /// Hex-encoded payload (or omit to read hex from stdin)
        payload: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let timeout = args.timeout_ms.map(Duration::from_millis);

    let mut client = ServiceClient::connect(&args.address).await?;
    if let Some(timeout) = timeout {
        client = client.with_timeout(timeout);
    }

    match args.command {
        Command::Health { service } => {
            let status = client.health(&service).await?;
            println!("status: {}", status.as_str_name());
        }

        Command::Message => {
            let message = client.get_message().await?;
            println!("type: {}", message.message_type);
            match message.message.as_ref().and_then(unpack_any::<StringValue>) {
                Some(Ok(value)) => println!("text: {}", value.value),
                Some(Err(e)) => return Err(e.into()),
                None => println!("payload: {:?}", message.message),
            }
        }

        Command::Greet { text } => {
            let text = resolve_text(text, "greet")?;
            println!("{}", client.greet(text).await?);
        }

        Command::Webfinger { resource } => {
            let response = client.web_finger(resource).await?;
            println!("resource: {}", response.resource);
            println!("port:     {}", response.port);
            for link in &response.links {
                println!("link:     {} {} {}", link.rel, link.r#type, link.href);
            }
        }

        Command::Call { method, payload } => {
            let payload = call_payload(payload, || resolve_text(None, "call"))?;
            let response = client.call(&method, Bytes::from(payload), timeout).await?;
            println!("status: {}", response.status());
            if let Some(message) = response.message() {
                println!("message: {message}");
            }
            for (key, value) in response.metadata().iter() {
                println!("{key}: {value}");
            }
            if response.status().is_ok() {
                println!("payload: {}", hex::encode(response.payload()));
            }
        }
    }

    Ok(())
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass it as an argument or via stdin)").into())
        }
    }
}


/// Hex payload for `call`: the argument when given, otherwise stdin.
///
/// Unlike [`resolve_text`], the two sources are never concatenated.
fn call_payload<F>(arg: Option<String>, stdin: F) -> Result<Vec<u8>, Box<dyn std::error::Error>>
where
    F: FnOnce() -> Result<String, Box<dyn std::error::Error>>,
{
    let text = match arg {
        Some(arg) => arg,
        None => stdin()?,
    };
    Ok(hex::decode(text.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_payload_prefers_argument_over_stdin() {
        let payload = call_payload(Some("0a026869".into()), || panic!("stdin must not be read")).unwrap();
        assert_eq!(payload, vec![0x0a, 0x02, 0x68, 0x69]);
    }

    #[test]
    fn call_payload_falls_back_to_stdin() {
        let payload = call_payload(None, || Ok(" 0a00\n".to_string())).unwrap();
        assert_eq!(payload, vec![0x0a, 0x00]);
    }

    #[test]
    fn call_payload_rejects_bad_hex() {
        assert!(call_payload(Some("zz".into()), || Ok(String::new())).is_err());
    }
}
