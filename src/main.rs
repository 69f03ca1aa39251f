//! One-shot CLI over the dispatch facade.

use clap::Parser;

use modelgate::{ModelDispatcher, SendOptions};

#[derive(Parser, Debug)]
#[command(
    name = "modelgate",
    version,
    about = "Send a prompt through the model dispatch layer"
)]
struct Cli {
    /// Prompt text to send.
    prompt: String,

    /// Logical model name (e.g. bedrock-sonnet, gpt-4o, anthropic-opus,
    /// local-<weights path>).
    #[arg(long, default_value = "bedrock-sonnet")]
    model: String,

    #[arg(long, default_value_t = 1000)]
    max_tokens: u32,

    #[arg(long, default_value_t = 0.5)]
    temperature: f32,

    /// Disable the streaming transport for gateway models.
    #[arg(long)]
    no_stream: bool,

    /// Print the text only, without the usage metrics record.
    #[arg(long)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    modelgate::util::init_tracing();
    let cli = Cli::parse();

    let dispatcher = ModelDispatcher::from_env().await;

    // Print streamed fragments as they arrive; the channel closes when the
    // send completes.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        use std::io::Write;
        let mut printed = false;
        while let Some(fragment) = rx.recv().await {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
            printed = true;
        }
        printed
    });

    let options = SendOptions {
        max_tokens: cli.max_tokens,
        temperature: cli.temperature,
        stream: !cli.no_stream,
        include_metrics: !cli.no_metrics,
        system_prompt: None,
        progress: Some(tx),
    };
    let result = dispatcher.send(&cli.prompt, &cli.model, options).await?;

    let streamed = printer.await.unwrap_or(false);
    if streamed {
        println!();
    } else {
        println!("{}", result.text);
    }

    if let Some(metrics) = result.metrics {
        eprintln!("{}", serde_json::to_string_pretty(&metrics)?);
    }

    Ok(())
}
