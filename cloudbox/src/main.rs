use cloudbox::{ClientConfig, Cloudbox, SessionStateResult};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Info {
        session_id: String,
        context_id: Option<String>,
        path: Option<String>,
    },
    Sync {
        session_id: String,
        context_id: Option<String>,
        path: Option<String>,
    },
    Pause {
        session_id: String,
    },
    Resume {
        session_id: String,
    },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(command) = args.next() else {
        return Ok(CliMode::Help);
    };
    if matches!(command.as_str(), "--help" | "-h" | "help") {
        return Ok(CliMode::Help);
    }
    let session_id = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("{command}: missing session id"))?;
    let context_id = args.next();
    let path = args.next();
    if let Some(extra) = args.next() {
        anyhow::bail!("unexpected argument: {extra}");
    }

    let mode = match command.as_str() {
        "info" => CliMode::Info {
            session_id,
            context_id,
            path,
        },
        "sync" => CliMode::Sync {
            session_id,
            context_id,
            path,
        },
        "pause" | "resume" if context_id.is_some() => {
            anyhow::bail!("{command} takes only a session id")
        }
        "pause" => CliMode::Pause { session_id },
        "resume" => CliMode::Resume { session_id },
        other => anyhow::bail!("unknown command: {other}"),
    };
    Ok(mode)
}

fn print_usage() {
    println!("Usage: cloudbox <command> <session-id> [context-id] [path]");
    println!("  info     Print per-path context sync status as JSON lines");
    println!("  sync     Sync context content and wait for completion");
    println!("  pause    Pause the session and wait until PAUSED");
    println!("  resume   Resume the session and wait until RUNNING");
}

fn report_state(result: SessionStateResult) -> anyhow::Result<()> {
    if result.success {
        println!(
            "{} (request {})",
            result.status.unwrap_or_default(),
            result.request_id
        );
        Ok(())
    } else {
        anyhow::bail!(result.error_message.unwrap_or_default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cloudbox=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let connect = || -> anyhow::Result<Cloudbox> {
        let config = ClientConfig::from_env()?;
        Ok(Cloudbox::new(&config)?)
    };
    match parse_cli_mode(std::env::args())? {
        CliMode::Help => print_usage(),
        CliMode::Info {
            session_id,
            context_id,
            path,
        } => {
            let info = connect()?
                .session(session_id)
                .context()
                .info(context_id.as_deref(), path.as_deref(), None)
                .await?;
            for item in &info.context_status_data {
                println!("{}", serde_json::to_string(item)?);
            }
            eprintln!("request {}", info.request_id);
        }
        CliMode::Sync {
            session_id,
            context_id,
            path,
        } => {
            let result = connect()?
                .session(session_id)
                .context()
                .sync(context_id.as_deref(), path.as_deref(), None)
                .await;
            if !result.success {
                anyhow::bail!(result.error_message.unwrap_or_default());
            }
            println!("synced (request {})", result.request_id);
        }
        CliMode::Pause { session_id } => {
            report_state(connect()?.session(session_id).pause_async(None, None).await)?;
        }
        CliMode::Resume { session_id } => {
            report_state(connect()?.session(session_id).resume_async(None, None).await)?;
        }
    }
    Ok(())
}
