//! notify: send one notification to the agent-notify daemon.
//!
//! Usage: notify <type> <message>

use agent_notify::client::{NotifyClient, DEFAULT_URL, URL_ENV};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "notify", about = "Send an audio notification to agent-notify")]
struct Args {
    /// Notification type (question, permission, done, error, status, waiting)
    #[arg(value_name = "TYPE")]
    kind: String,

    /// Message to speak
    message: String,

    /// Daemon base URL
    #[arg(long, env = URL_ENV, default_value = DEFAULT_URL)]
    url: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let client = NotifyClient::new(&args.url);

    match client.notify(&args.kind, &args.message).await {
        Ok(_) => println!("{}: \"{}\"", args.kind, args.message),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
