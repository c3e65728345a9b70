use clap::Parser;
use playback_ctl::cli::{Cli, Command};
use playback_ctl::control::{ControlHandle, spawn_control_thread};
use playback_ctl::controller::SourceOptions;
use playback_ctl::engine::EngineBackend;
use playback_ctl::error::AppError;
use playback_ctl::events::EventReceiver;
use playback_ctl::settings;
use playback_ctl::{host, logging};
use std::env;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::select;

const CLI_PLAYER_ID: &str = "cli";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(settings::default_data_dir);

    let no_audio_env = env::var("PLAYBACK_NO_AUDIO")
        .ok()
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);
    let backend = if cli.no_audio || no_audio_env {
        EngineBackend::Simulated
    } else {
        EngineBackend::Rodio
    };

    let _log_guard = logging::init(
        &data_dir,
        logging::LogConfig {
            dir: cli.log_dir.clone(),
            filter: cli.log_filter.clone(),
        },
    );
    tracing::info!(data_dir = %data_dir.display(), ?backend, "playback-ctl 启动");

    let playback_settings = settings::load_settings(&data_dir);
    if !settings::settings_path(&data_dir).exists()
        && let Err(e) = settings::save_settings(&data_dir, &playback_settings)
    {
        tracing::warn!(err = %e, "写入默认设置失败");
    }

    let (handle, events) = spawn_control_thread(backend, &playback_settings).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!("启动模式: Serve");
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(err = %e, "监听 Ctrl-C 失败");
                    std::future::pending::<()>().await;
                }
                tracing::info!("收到 Ctrl-C");
            };
            host::serve_until(
                handle,
                events,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                ctrl_c,
            )
            .await
        }
        Command::Play {
            url,
            volume,
            looping,
            fade_to,
            fade_secs,
            seconds,
        } => {
            tracing::info!(url = %url, "启动模式: Play");
            let mut source = SourceOptions::new(url).autoplay(true);
            if let Some(v) = volume {
                source = source.volume(v);
            }
            let fade = fade_to.zip(fade_secs);
            run_play(
                handle,
                events,
                source,
                looping,
                fade,
                Duration::from_secs(seconds),
            )
            .await
        }
    }
}

async fn run_play(
    handle: ControlHandle,
    mut events: EventReceiver,
    source: SourceOptions,
    looping: bool,
    fade: Option<(f32, f64)>,
    run_for: Duration,
) -> Result<(), AppError> {
    handle.create_player(CLI_PLAYER_ID).await?;
    handle.set_loop(CLI_PLAYER_ID, looping).await?;
    handle.set_source(CLI_PLAYER_ID, source).await?;
    if let Some((target, secs)) = fade {
        handle.fade_volume(CLI_PLAYER_ID, target, secs).await?;
    }

    let mut stdout = tokio::io::stdout();
    let deadline = tokio::time::sleep(run_for);
    tokio::pin!(deadline);

    loop {
        select! {
            maybe_evt = events.recv() => {
                let Some(evt) = maybe_evt else {
                    return Ok(());
                };
                let mut line = serde_json::to_vec(&evt)?;
                line.push(b'\n');
                stdout.write_all(&line).await?;
                stdout.flush().await?;
            }
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("收到 Ctrl-C");
                break;
            }
        }
    }

    let disposed = handle.shutdown().await?;
    tracing::info!(disposed, "play 结束");
    while let Some(evt) = events.recv().await {
        tracing::debug!(event = %evt.kind(), "late event after shutdown");
    }
    Ok(())
}
