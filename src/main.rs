use std::io::Write;
use std::process::ExitCode;

use chatstream::config::{load_config, AppConfig};
use chatstream::observability::init_tracing;
use chatstream::session::{SessionController, SessionStatus, StreamingCallbacks};
use chatstream::stream::{FramingPolicy, ToolCall, ToolResult};
use chatstream::transport::{ChatRequestBody, HttpTransport, StreamRequest};
use serde_json::Value;

const CONFIG_ENV: &str = "CHATSTREAM_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn main() -> ExitCode {
    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: chatstream <prompt>");
        return ExitCode::from(2);
    }

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from '{config_path}': {e}");
            eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
            return ExitCode::from(2);
        }
    };

    init_tracing(&config.features.log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config, prompt))
}

async fn run(config: AppConfig, prompt: String) -> ExitCode {
    let transport = match HttpTransport::new(&config.backend) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };
    let body = ChatRequestBody::user_prompt(config.backend.model.clone(), prompt);
    let request = match StreamRequest::from_backend(&config.backend, &body) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let controller =
        SessionController::new(transport).with_framing(FramingPolicy::from(&config.decoder));
    let handle = controller.start(request, ConsolePrinter::default());

    let cancel = handle.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n[cancelled]");
            cancel.cancel();
        }
    });

    match handle.join().await {
        Ok(outcome) => match outcome.status {
            SessionStatus::Failed => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        },
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Streams tokens to stdout and tool activity to stderr.
#[derive(Debug, Default)]
struct ConsolePrinter {
    wrote_text: bool,
}

impl StreamingCallbacks for ConsolePrinter {
    fn on_token(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
        self.wrote_text = true;
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        eprintln!(
            "[tool] {} {}({})",
            call.id,
            call.function_name(),
            call.function.arguments
        );
    }

    fn on_tool_result(&mut self, result: &ToolResult) {
        let id = result.tool_call_id.as_deref().unwrap_or("?");
        match result.error.as_deref() {
            Some(error) => eprintln!("[tool] {id} failed: {error}"),
            None => eprintln!("[tool] {id} -> {}", result.result),
        }
    }

    fn on_error(&mut self, message: &str) {
        if self.wrote_text {
            println!();
        }
        eprintln!("error: {message}");
    }

    fn on_end(&mut self, _meta: Option<&Value>) {
        if self.wrote_text {
            println!();
        }
    }
}
