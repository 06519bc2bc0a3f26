use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use omomuki_rs::client::{AskOptions, ask_to_stdout};
use omomuki_rs::config::{LimitsConfig, RateLimitConfig, ServerConfig, UpstreamConfig};
use omomuki_rs::grammar::TagSet;
use omomuki_rs::io_struct::AnalyzeRequest;
use omomuki_rs::logging::{self, LoggingConfig};
use omomuki_rs::server;

#[derive(Parser, Debug)]
#[command(name = "omomuki")]
#[command(about = "Streams model findings about a text or image and renders them as they arrive")]
#[command(long_about = r#"
omomuki - streaming analysis service

Examples:
  # Serve the API against the default upstream
  OMOMUKI_API_KEY=... omomuki serve --port 3000

  # Ask a running server about some text
  omomuki ask --text "Moss on an old stone lantern after rain"
"#)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Submit one request to a running server and render the answer
    Ask(AskArgs),
}

#[derive(Args, Debug)]
struct TagArgs {
    /// Use neutral tag names (finding/findings/category) instead of the default vocabulary
    #[arg(long, default_value_t = false)]
    neutral_tags: bool,
}

impl TagArgs {
    fn tag_set(&self) -> TagSet {
        if self.neutral_tags {
            TagSet::neutral()
        } else {
            TagSet::default()
        }
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Host address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Base URL of the OpenAI-compatible upstream
    #[arg(long, default_value = "https://api.ai.sakura.ad.jp/v1")]
    upstream_url: String,

    /// Upstream API key
    #[arg(long, env = "OMOMUKI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upstream model name
    #[arg(long, default_value = "preview/Qwen3-VL-30B-A3B-Instruct")]
    model: String,

    /// Replace the built-in system prompt. It must still describe the tag grammar
    #[arg(long)]
    system_prompt: Option<String>,

    /// Completion token cap
    #[arg(long, default_value_t = 1024)]
    max_tokens: u32,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 600)]
    request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    max_payload_size: usize,

    /// Maximum text length in characters
    #[arg(long, default_value_t = 1000)]
    max_text_chars: usize,

    /// Maximum encoded image size in bytes
    #[arg(long, default_value_t = 5 * 1024 * 1024)]
    max_image_bytes: usize,

    /// Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    rate_limit_window_secs: u64,

    /// Requests allowed per caller per window
    #[arg(long, default_value_t = 30)]
    rate_limit_max_requests: u32,

    #[command(flatten)]
    tags: TagArgs,

    /// Directory for rolling log files
    #[arg(long)]
    log_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

impl ServeArgs {
    fn into_server_config(self) -> ServerConfig {
        let tags = self.tags.tag_set();
        ServerConfig {
            host: self.host,
            port: self.port,
            max_payload_size: self.max_payload_size,
            upstream: UpstreamConfig {
                base_url: self.upstream_url,
                api_key: self.api_key,
                model: self.model,
                max_tokens: self.max_tokens,
                request_timeout_secs: self.request_timeout_secs,
                system_prompt: self.system_prompt,
            },
            limits: LimitsConfig {
                max_text_chars: self.max_text_chars,
                max_image_bytes: self.max_image_bytes,
            },
            rate_limit: RateLimitConfig {
                window_secs: self.rate_limit_window_secs,
                max_requests: self.rate_limit_max_requests,
                ..Default::default()
            },
            tags,
            log_dir: self.log_dir,
            log_level: Some(self.log_level),
            log_json: self.log_json,
        }
    }
}

#[derive(Args, Debug)]
struct AskArgs {
    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Text to analyse
    #[arg(long)]
    text: Option<String>,

    /// Image as a data URL
    #[arg(long)]
    image_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    #[command(flatten)]
    tags: TagArgs,

    /// Interleave debug logs with the rendered output
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let config = args.into_server_config();
            actix_web::rt::System::new().block_on(server::startup(config))
        }
        Command::Ask(args) => {
            let _log_guard = args.verbose.then(|| {
                logging::init_logging(LoggingConfig {
                    level: tracing::Level::DEBUG,
                    ..Default::default()
                })
            });
            let options = AskOptions {
                server_url: args.server,
                request: AnalyzeRequest {
                    text: args.text,
                    image_url: args.image_url,
                },
                tags: args.tags.tag_set(),
                timeout: Duration::from_secs(args.timeout_secs),
            };
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(ask_to_stdout(&options))
        }
    }
}
