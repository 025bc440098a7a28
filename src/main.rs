use clap::Parser;

use cordlink::models::channel::kind;
use cordlink::{Config, GatewayClient, GatewayEvent};

#[derive(Parser)]
#[command(name = "cordlink", version, about = "Connect to the gateway and inspect session state")]
struct Cli {
    /// Bearer token; falls back to the CORDLINK_TOKEN environment variable.
    #[arg(long)]
    token: Option<String>,
    /// Stay connected and print message events as they arrive.
    #[arg(long)]
    follow: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cordlink=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    print_banner(&config);

    let token = cli
        .token
        .or_else(|| std::env::var("CORDLINK_TOKEN").ok())
        .filter(|t| !t.is_empty());
    let Some(token) = token else {
        eprintln!("no credential: pass --token or set CORDLINK_TOKEN");
        std::process::exit(2);
    };

    let client = GatewayClient::new(config);
    client.set_credential(token).await;
    let mut events = client.subscribe();

    if let Err(err) = client.connect().await {
        eprintln!("connect failed: {err}");
        std::process::exit(1);
    }

    print_snapshot(&client);

    if cli.follow {
        eprintln!("  \x1b[2mfollowing message events, ctrl-c to stop\x1b[0m");
        eprintln!();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Ok(GatewayEvent::Message(msg)) => {
                        let channel = msg["channel_id"].as_str().unwrap_or("?");
                        let author = msg["author"]["username"].as_str().unwrap_or("?");
                        let content = msg["content"].as_str().unwrap_or("");
                        println!("[{channel}] {author}: {content}");
                    }
                    Ok(GatewayEvent::Reconnecting { reason }) => {
                        eprintln!("  \x1b[33m! reconnecting: {reason}\x1b[0m");
                    }
                    Ok(GatewayEvent::Closed) => {
                        eprintln!("  \x1b[33m! connection closed\x1b[0m");
                        break;
                    }
                    Ok(GatewayEvent::Ready { .. }) => {
                        print_snapshot(&client);
                    }
                    Err(_) => break,
                }
            }
        }
    }

    client.disconnect().await;
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let sha = env!("GIT_SHA");

    eprintln!();
    eprintln!("  \x1b[1;36mcordlink\x1b[0m \x1b[2mv{version} ({sha})\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mgateway\x1b[0m      {}", config.gateway_url);
    eprintln!();
}

fn print_snapshot(client: &GatewayClient) {
    if let Some(user) = client.current_user() {
        eprintln!("  \x1b[2muser\x1b[0m         {} ({})", user.username, user.id);
    }

    let guilds = client.guilds();
    eprintln!("  \x1b[2mguilds\x1b[0m       {}", guilds.len());
    for guild in &guilds {
        println!("  {} {}", guild.id, guild.name);
        for channel in client.guild_channels(&guild.id) {
            let marker = if channel.kind == kind::GUILD_VOICE {
                "voice"
            } else {
                "text"
            };
            println!("    {} #{} ({marker})", channel.id, channel.name);
        }
    }

    let dms = client.dm_channels();
    eprintln!("  \x1b[2mdms\x1b[0m          {}", dms.len());
    for dm in &dms {
        println!("  {} {}", dm.id, dm.name);
    }

    let friends = client.friends();
    eprintln!("  \x1b[2mfriends\x1b[0m      {}", friends.len());
    for friend in &friends {
        println!("  {} {}", friend.id, friend.username);
    }
    eprintln!();
}
