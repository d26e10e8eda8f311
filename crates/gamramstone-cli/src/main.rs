//! Gamramstone command line client.
//!
//! Inspects channel lists and applies caption tracks without the web
//! frontend. Results are printed to stdout as JSON; logs go to stderr and,
//! with `--log-dir`, to a daily rolling file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use gamramstone_core::core::api::ApiClient;
use gamramstone_core::core::cache::pending_works;
use gamramstone_core::core::logging::{init_logging, LoggingOptions};
use gamramstone_core::core::models::{Video, WorkStatus};
use gamramstone_core::core::notify::TracingNotifier;
use gamramstone_core::core::platform::{ApplyRequest, LivePlatform, YouTubeClient};
use gamramstone_core::core::session::{Role, Session, Uploadability, YOUTUBE_UPLOAD_SCOPE};
use gamramstone_core::core::settings::{ApplyMode, ClientConfig, ConfigManager, RemoteSettings};
use gamramstone_core::core::status::can_show_apply_button;
use gamramstone_core::core::upload::UploadCoordinator;
use gamramstone_core::core::{AppliedPair, ChannelId};
use gamramstone_core::{CaptionApplyService, ChannelView};

#[derive(Parser, Debug)]
#[command(name = "gamramstone-cli")]
#[command(version, about = "Gamramstone caption archive client")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the config file
    #[arg(long, value_name = "URL", global = true)]
    api_base: Option<String>,

    /// Directory for rolling log files
    #[arg(long, value_name = "PATH", global = true)]
    log_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the videos of a channel tab
    Lists {
        #[arg(long)]
        channel: ChannelId,
        #[arg(long, default_value = "waiting")]
        tab: WorkStatus,
    },
    /// Show the upload progress of a channel
    Stats {
        #[arg(long)]
        channel: ChannelId,
    },
    /// Show the backend settings
    Settings,
    /// List the waiting (video, language) pairs of a channel
    Pending {
        #[arg(long)]
        channel: ChannelId,
    },
    /// Apply caption tracks to YouTube
    Apply {
        #[arg(long)]
        channel: ChannelId,
        /// Video id or YouTube id
        #[arg(long, required_unless_present = "all")]
        video: Option<String>,
        /// Track language; with --all, only this language
        #[arg(long, required_unless_present = "all")]
        lang: Option<String>,
        /// Apply every waiting track of the channel
        #[arg(long, conflicts_with = "video")]
        all: bool,
        /// Skip the YouTube push and confirm as a test update
        #[arg(long)]
        simulate: bool,
        /// Role the identity provider assigned to the token's user.
        ///
        /// A frontend with a session provider takes the role from there;
        /// here it must be stated explicitly to go beyond viewer rights.
        #[arg(long, default_value = "viewer")]
        role: Role,
        /// OAuth access token with the YouTube upload scope
        #[arg(long, env = "GAMRAMSTONE_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Scopes granted to the token, separated by spaces or commas
        #[arg(long, env = "GAMRAMSTONE_TOKEN_SCOPES")]
        scopes: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no waiting videos")]
    NoWaitingVideos,

    #[error("video {video} not found in channel {channel}")]
    VideoNotFound { video: String, channel: ChannelId },

    #[error("applying is disabled for the {0} role")]
    ApplyHidden(Role),

    #[error("the token lacks the YouTube upload permission ({scope})")]
    NeedsUploadPermission { scope: &'static str },
}

/// Outcome of one pair in an `apply` run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyOutcome {
    video_id: String,
    language: String,
    applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::at_path(path.clone()),
        None => ConfigManager::platform_default()?,
    };
    let mut config = manager.load();
    config.apply_env_overrides();
    if let Some(api_base) = &cli.api_base {
        config.api_base_url = api_base.clone();
        config.normalize();
    }

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };
    init_logging(&LoggingOptions {
        level,
        log_dir: cli.log_dir.clone(),
        ansi: false,
    })?;
    debug!(
        config = %manager.config_path().display(),
        api = %config.api_base_url,
        "Configuration loaded"
    );

    let api = ApiClient::new(&config)?;

    match cli.command {
        Command::Lists { channel, tab } => {
            let videos = api.fetch_list(channel, tab).await?;
            print_json(&videos)
        }
        Command::Stats { channel } => {
            let stats = api.fetch_stats(channel).await?;
            print_json(&stats)
        }
        Command::Settings => {
            let settings = api.fetch_settings().await?;
            print_json(&settings)
        }
        Command::Pending { channel } => {
            let videos = api.fetch_list(channel, WorkStatus::Waiting).await?;
            print_json(&pending_works(&videos))
        }
        Command::Apply {
            channel,
            video,
            lang,
            all,
            simulate,
            role,
            token,
            scopes,
        } => {
            let target = ApplyTarget {
                channel,
                video,
                lang,
                all,
            };
            let mut session = Session::signed_in(token.unwrap_or_default(), role);
            if let Some(scopes) = &scopes {
                session = session.with_granted_scopes(scopes);
            }
            let outcomes = run_apply(&config, api, &session, target, simulate).await?;
            print_json(&outcomes)
        }
    }
}

struct ApplyTarget {
    channel: ChannelId,
    video: Option<String>,
    lang: Option<String>,
    all: bool,
}

async fn run_apply(
    config: &ClientConfig,
    api: ApiClient,
    session: &Session,
    target: ApplyTarget,
    simulate: bool,
) -> Result<Vec<ApplyOutcome>> {
    let settings = match api.fetch_settings().await {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "Failed to fetch backend settings, using defaults");
            RemoteSettings::default()
        }
    };
    if !can_show_apply_button(&settings, session.role) {
        return Err(CliError::ApplyHidden(session.role).into());
    }
    ensure_uploadable(session)?;

    let mode = if simulate {
        ApplyMode::simulated()
    } else {
        config.apply_mode
    };
    if mode.is_simulated() {
        warn!("Simulated mode: captions will not be pushed to YouTube");
    }

    let view = ChannelView::new(Arc::new(api.clone()));
    let platform = LivePlatform::new(YouTubeClient::new(config)?, api);
    let service = CaptionApplyService::new(
        Arc::new(platform),
        UploadCoordinator::shared(),
        Arc::new(TracingNotifier),
    )
    .with_mode(mode)
    .on_applied(view.applied_hook());

    let (videos, pairs) = if target.all {
        let snapshot = view
            .open(target.channel, WorkStatus::Waiting)
            .await?
            .context("channel view changed while loading")?;
        let pairs: Vec<AppliedPair> = pending_works(&snapshot.videos)
            .into_iter()
            .filter(|p| target.lang.as_ref().is_none_or(|l| *l == p.language))
            .collect();
        if pairs.is_empty() {
            return Err(CliError::NoWaitingVideos.into());
        }
        (snapshot.videos.clone(), pairs)
    } else {
        let video_id = target.video.unwrap_or_default();
        let language = target.lang.unwrap_or_default();
        let video = find_video(&view, target.channel, &video_id).await?;
        let pair = AppliedPair::new(video.id.clone(), language);
        (vec![video], vec![pair])
    };

    let mut outcomes = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Some(video) = videos.iter().find(|v| v.matches(&pair.video_id)) else {
            continue;
        };
        let request = ApplyRequest::for_track(video, &pair.language)?;

        let outcome = match service.apply(session, &request).await {
            Ok(_) => ApplyOutcome {
                video_id: request.video_id,
                language: request.language,
                applied: true,
                error: None,
            },
            Err(e) => ApplyOutcome {
                video_id: request.video_id,
                language: request.language,
                applied: false,
                error: Some(e.user_message()),
            },
        };
        outcomes.push(outcome);
    }

    let applied = outcomes.iter().filter(|o| o.applied).count();
    info!(applied, total = outcomes.len(), "Apply run finished");
    Ok(outcomes)
}

/// Looks for a video in every tab of a channel
async fn find_video(view: &ChannelView, channel: ChannelId, video_id: &str) -> Result<Video> {
    for tab in WorkStatus::TABS {
        let Some(snapshot) = view.open(channel, tab).await? else {
            continue;
        };
        if let Some(video) = snapshot.videos.iter().find(|v| v.matches(video_id)) {
            debug!(video_id, tab = %tab, "Found video");
            return Ok(video.clone());
        }
    }

    Err(CliError::VideoNotFound {
        video: video_id.to_string(),
        channel,
    }
    .into())
}

/// Signed-in users without the upload scope must re-authorize first.
///
/// Signed-out sessions pass through so the apply service reports them.
fn ensure_uploadable(session: &Session) -> Result<(), CliError> {
    if session.is_authenticated() && session.uploadability() == Uploadability::NeedsPermission {
        return Err(CliError::NeedsUploadPermission {
            scope: YOUTUBE_UPLOAD_SCOPE,
        });
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{}", out);
    Ok(())
}
