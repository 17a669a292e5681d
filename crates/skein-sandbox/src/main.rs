use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use skein_sandbox::{
    InputHandler, InputKind, LogSink, SandboxExecutor, SandboxHooks,
};
use skein_trace::{dependency_flowchart, infer_flowchart, sequence_diagram, Span};

/// Built-in program used when `run` is given no file: exercises spans,
/// diagnostics, the interaction bridge and graph publication.
const DEMO_PROGRAM: &str = r#"
print("starting demo workflow");

let plan = span_start("plan", #{ goal: "demo" });
let proceed = request_confirm("run the summarize step?");
span_end(plan, #{ proceed: proceed });

if proceed {
    let fetch = span_start("fetch", (), plan);
    let topic = request_text("topic to summarize?", "agents");
    span_end(fetch, #{ topic: topic });

    let summarize = span_start("summarize", (), fetch);
    if API_KEY == "" {
        log_warn("no credential; skipping generation");
        span_end(summarize, ());
    } else {
        let summary = generate("Summarize: " + topic);
        span_end(summarize, #{ summary: summary });
    }
} else {
    log_warn("summarize step declined");
}

publish_graph();
print("demo workflow done");
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Command::new("skein")
        .version("0.1.0")
        .about("Sandboxed agent-program runner")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run a program and print its diagrams")
                .arg(Arg::new("file").help("Program source (defaults to a built-in demo)"))
                .arg(
                    Arg::new("credential")
                        .long("credential")
                        .default_value("")
                        .help("Credential injected into the program"),
                )
                .arg(
                    Arg::new("decline")
                        .long("decline")
                        .action(ArgAction::SetTrue)
                        .help("Answer every input request with a cancellation"),
                ),
        )
        .subcommand(
            Command::new("infer")
                .about("Infer a flowchart from unexecuted source")
                .arg(Arg::new("file").required(true).help("Program source file")),
        );

    match cli.get_matches().subcommand() {
        Some(("run", args)) => {
            let source = match args.get_one::<String>("file") {
                Some(path) => std::fs::read_to_string(path)?,
                None => DEMO_PROGRAM.to_string(),
            };
            let credential = args
                .get_one::<String>("credential")
                .cloned()
                .unwrap_or_default();
            run(&source, &credential, args.get_flag("decline")).await?;
        }
        Some(("infer", args)) => {
            let path = args
                .get_one::<String>("file")
                .ok_or_else(|| anyhow::anyhow!("missing source file"))?;
            let source = std::fs::read_to_string(path)?;
            println!("{}", infer_flowchart(&source));
        }
        _ => unreachable!("arg_required_else_help"),
    }

    Ok(())
}

async fn run(source: &str, credential: &str, decline: bool) -> anyhow::Result<()> {
    let published: Arc<Mutex<Vec<Span>>> = Arc::new(Mutex::new(Vec::new()));

    let on_log: LogSink = Arc::new(|record| {
        println!("[{:>7}] {}", record.level.to_string(), record.content);
    });
    let on_graph = {
        let published = Arc::clone(&published);
        Arc::new(move |spans: Vec<Span>| *published.lock() = spans)
            as Arc<dyn Fn(Vec<Span>) + Send + Sync>
    };
    // Answer bridge requests without a human in the loop: confirm yes,
    // text with its default, unless --decline was passed.
    let on_input: InputHandler = Arc::new(move |request| {
        if decline {
            request.cancel();
            return;
        }
        match &request.kind {
            InputKind::Confirm => request.resolve(serde_json::json!(true)),
            InputKind::Text { default } => {
                let answer = default.clone().unwrap_or_default();
                request.resolve(serde_json::json!(answer));
            }
        }
    });

    let executor = SandboxExecutor::new(SandboxHooks {
        on_log,
        on_graph,
        on_input,
    });
    let spans = executor.execute(source, credential).await?;

    let published = published.lock().clone();
    let spans = if published.is_empty() { spans } else { published };

    println!("\n--- dependency flowchart ---");
    println!("{}", dependency_flowchart(&spans));
    println!("--- sequence diagram ---");
    println!("{}", sequence_diagram(&spans));

    Ok(())
}
