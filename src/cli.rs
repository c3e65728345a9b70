use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "playback-ctl",
    version,
    about = "多实例媒体播放控制器（JSON 行协议）"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// 覆盖数据目录（默认走系统 data_local_dir）
    #[arg(long, global = true, env = "PLAYBACK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// 覆盖日志目录（默认 `{data_dir}/logs`）
    #[arg(long, global = true, env = "PLAYBACK_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// 覆盖日志过滤（等价于设置 RUST_LOG）
    #[arg(long, global = true, env = "RUST_LOG")]
    pub log_filter: Option<String>,

    /// 使用无声模拟引擎（也可设置 PLAYBACK_NO_AUDIO=1）
    #[arg(long, global = true)]
    pub no_audio: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 在 stdin/stdout 上运行宿主协议（默认）
    Serve,

    /// 播放单个来源并把事件打印为 JSON 行
    Play {
        url: String,

        #[arg(long)]
        volume: Option<f32>,

        /// 播放结束后从头开始
        #[arg(long = "loop")]
        looping: bool,

        /// 淡变目标音量，需配合 --fade-secs
        #[arg(long, requires = "fade_secs")]
        fade_to: Option<f32>,

        #[arg(long, requires = "fade_to")]
        fade_secs: Option<f64>,

        /// 运行多少秒后退出
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}
