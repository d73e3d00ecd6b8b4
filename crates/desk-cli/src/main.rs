//! deskctl - drive and watch content desks from the terminal

mod render;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use desk_core::{can_start_run, DeskId, PhaseKind, RunTarget, SettingsPatch, TopicId};
use desk_sync::{DeskApi, DeskView, FeedbackOutcome, HttpDeskApi, SyncConfig};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn desk_arg() -> Arg {
    Arg::new("desk")
        .required(true)
        .help("Desk identifier")
}

fn cli() -> Command {
    Command::new("deskctl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Trigger and watch content-generation desks")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .global(true)
                .help("API base URL (overrides config and DESK_BASE_URL)"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .help("Bearer token (overrides config and DESK_API_TOKEN)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging unless RUST_LOG says otherwise"),
        )
        .subcommand(
            Command::new("watch")
                .about("Follow a desk's status live")
                .arg(desk_arg())
                .arg(
                    Arg::new("until-settled")
                        .long("until-settled")
                        .action(ArgAction::SetTrue)
                        .help("Exit once the desk accepts new runs again after being busy"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Print the current generation status")
                .arg(desk_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print desk details and phase results")
                .arg(desk_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Start a phase or the full pipeline")
                .arg(desk_arg())
                .arg(
                    Arg::new("target")
                        .required(true)
                        .value_parser(value_parser!(RunTarget))
                        .help("ideation, outline, content or full"),
                )
                .arg(
                    Arg::new("follow")
                        .long("follow")
                        .action(ArgAction::SetTrue)
                        .help("Watch until the run settles"),
                ),
        )
        .subcommand(
            Command::new("feedback")
                .about("Save feedback for one phase")
                .arg(desk_arg())
                .arg(
                    Arg::new("phase")
                        .required(true)
                        .value_parser(value_parser!(PhaseKind))
                        .help("ideation, outline or content"),
                )
                .arg(Arg::new("text").required(true).help("Feedback text")),
        )
        .subcommand(
            Command::new("settings")
                .about("Set platform and/or content type")
                .arg(desk_arg())
                .arg(Arg::new("platform").long("platform").help("Target platform"))
                .arg(
                    Arg::new("content-type")
                        .long("content-type")
                        .help("Content type"),
                ),
        )
        .subcommand(
            Command::new("promote")
                .about("Promote a topic's generated content to review")
                .arg(Arg::new("topic").required(true).help("Topic identifier")),
        )
        .subcommand(Command::new("catalog").about("List allowed platforms and content types"))
}

fn init_tracing(json: bool, verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout is reserved for command output.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<SyncConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SyncConfig::new().with_env_overrides(),
    };
    if let Some(url) = matches.get_one::<String>("base-url") {
        config = config.with_base_url(url);
    }
    if let Some(token) = matches.get_one::<String>("token") {
        config = config.with_api_token(token);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn desk_id(args: &ArgMatches) -> Result<DeskId> {
    args.get_one::<String>("desk")
        .map(|id| DeskId::new(id.as_str()))
        .context("desk identifier is required")
}

async fn mounted_view(config: &SyncConfig, desk_id: DeskId) -> Result<DeskView> {
    let mut view = DeskView::connect(config).context("creating desk client")?;
    view.mount(Some(desk_id.clone()))
        .await
        .with_context(|| format!("loading desk {desk_id}"))?;
    Ok(view)
}

async fn watch(view: &DeskView, until_settled: bool) -> Result<()> {
    let mut status = view.subscribe();
    let mut notices = view.notices();

    let initial = status.borrow_and_update().clone();
    println!("{}", render::status_line(&initial));
    let mut was_busy = !can_start_run(&initial);

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                println!("{}", render::status_line(&current));
                let busy = !can_start_run(&current);
                if until_settled && was_busy && !busy {
                    break;
                }
                was_busy |= busy;
            }
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{}", render::notice_line(&notice)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notices dropped");
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for Ctrl-C")?;
                break;
            }
        }
    }
    Ok(())
}

async fn dispatch(matches: &ArgMatches, config: &SyncConfig) -> Result<()> {
    match matches.subcommand() {
        Some(("watch", args)) => {
            let view = mounted_view(config, desk_id(args)?).await?;
            watch(&view, args.get_flag("until-settled")).await
        }
        Some(("status", args)) => {
            let api = HttpDeskApi::new(config)?;
            let id = desk_id(args)?;
            let status = api
                .get_status(&id)
                .await
                .with_context(|| format!("fetching status of {id}"))?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", render::status_line(&status));
            }
            Ok(())
        }
        Some(("show", args)) => {
            let api = HttpDeskApi::new(config)?;
            let id = desk_id(args)?;
            let desk = api
                .get_desk(&id)
                .await
                .with_context(|| format!("fetching desk {id}"))?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&desk)?);
            } else {
                print!("{}", render::desk_summary(&desk));
            }
            Ok(())
        }
        Some(("run", args)) => {
            let target = *args
                .get_one::<RunTarget>("target")
                .context("run target is required")?;
            let view = mounted_view(config, desk_id(args)?).await?;
            let ack = view
                .start(target)
                .await
                .with_context(|| format!("starting {target} run"))?;
            println!("{}", ack.message);
            if args.get_flag("follow") {
                watch(&view, true).await?;
            }
            Ok(())
        }
        Some(("feedback", args)) => {
            let kind = *args
                .get_one::<PhaseKind>("phase")
                .context("phase is required")?;
            let text = args
                .get_one::<String>("text")
                .context("feedback text is required")?;
            let view = mounted_view(config, desk_id(args)?).await?;
            match view
                .save_feedback(kind, text)
                .await
                .with_context(|| format!("saving {kind} feedback"))?
            {
                FeedbackOutcome::Saved => println!("Saved {kind} feedback"),
                FeedbackOutcome::Unchanged => println!("No changes"),
            }
            Ok(())
        }
        Some(("settings", args)) => {
            let mut patch = SettingsPatch::new();
            if let Some(platform) = args.get_one::<String>("platform") {
                patch = patch.with_platform(platform);
            }
            if let Some(content_type) = args.get_one::<String>("content-type") {
                patch = patch.with_content_type(content_type);
            }
            if patch.is_empty() {
                bail!("nothing to update: pass --platform and/or --content-type");
            }
            let view = mounted_view(config, desk_id(args)?).await?;
            let desk = view
                .update_settings(&patch)
                .await
                .context("updating settings")?;
            print!("{}", render::desk_summary(&desk));
            Ok(())
        }
        Some(("promote", args)) => {
            let topic = args
                .get_one::<String>("topic")
                .map(|t| TopicId::new(t.as_str()))
                .context("topic identifier is required")?;
            let api = HttpDeskApi::new(config)?;
            let post = api
                .promote_to_review(&topic)
                .await
                .with_context(|| format!("promoting topic {topic}"))?;
            println!("{}", serde_json::to_string_pretty(&post)?);
            Ok(())
        }
        Some(("catalog", _)) => {
            let api = HttpDeskApi::new(config)?;
            let catalog = api.settings_catalog().await.context("fetching catalog")?;
            print!("{}", render::catalog_summary(&catalog));
            Ok(())
        }
        Some((other, _)) => bail!("unknown command {other}"),
        None => bail!("no command given"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"), matches.get_flag("verbose"));
    let config = load_config(&matches)?;
    tracing::debug!(base_url = %config.base_url, "configuration resolved");
    dispatch(&matches, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn run_target_parses() {
        let matches = cli()
            .try_get_matches_from(["deskctl", "run", "d1", "full", "--follow"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_one::<RunTarget>("target"), Some(&RunTarget::Full));
        assert!(args.get_flag("follow"));

        assert!(cli()
            .try_get_matches_from(["deskctl", "run", "d1", "publish"])
            .is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from([
                "deskctl",
                "status",
                "d1",
                "--base-url",
                "http://desk.internal:9000",
                "--token",
                "t0k",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.base_url, "http://desk.internal:9000");
        assert_eq!(config.api_token.as_deref(), Some("t0k"));
    }

    #[test]
    fn feedback_phase_rejects_full() {
        assert!(cli()
            .try_get_matches_from(["deskctl", "feedback", "d1", "full", "text"])
            .is_err());
    }
}
