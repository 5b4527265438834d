use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spanforest::import::load_trace_file;
use spanforest::persistent::{load_settings, save_settings, Settings};
use spanforest::render::{render_span_details, render_view, RenderOptions};
use spanforest::timeline::interval_unit_by_name;
use spanforest::TraceView;

/// Show the span forest of a trace.
#[derive(Debug, Parser)]
#[command(name = "spanforest", version)]
struct Args {
    /// Trace file: a JSON span payload or an OTLP JSON export, optionally gzipped.
    #[arg(required_unless_present = "write_default_config")]
    file: Option<PathBuf>,

    /// Focus on the subtree of this span. Can be repeated, each focus narrows the previous one.
    #[arg(long)]
    focus: Vec<String>,

    /// Go back to the full trace after applying the focus flags.
    #[arg(long)]
    reset: bool,

    /// Print the details of this span.
    #[arg(long)]
    select: Option<String>,

    /// Width of the span bars, in characters.
    #[arg(long)]
    width: Option<usize>,

    /// Timeline unit: ms, s or m.
    #[arg(long)]
    unit: Option<String>,

    /// Settings file to use instead of the one in the user's config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the default settings and exit.
    #[arg(long)]
    write_default_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.write_default_config {
        let path = save_settings(&Settings::default(), args.config.as_deref())?;
        println!("Wrote default settings to {}", path.display());
        return Ok(());
    }

    let settings = load_settings(args.config.as_deref())?;
    let Some(file) = args.file else {
        anyhow::bail!("No trace file given");
    };
    let payload = load_trace_file(&file)?;

    let unit_name = args.unit.or_else(|| settings.interval_unit.clone());
    let unit = match unit_name {
        Some(name) => Some(
            interval_unit_by_name(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown timeline unit '{}'", name))?,
        ),
        None => None,
    };

    let mut view = TraceView::new(&payload.spans, &settings);
    for span_id in &args.focus {
        if !view.focus(span_id) {
            tracing::warn!(span_id = %span_id, "span not found in the displayed trace");
        }
    }
    if args.reset {
        view.reset();
    }

    let options = RenderOptions {
        width: args.width.unwrap_or(settings.render_width),
        unit,
        is_sub_tree: payload.is_sub_tree,
    };
    print!("{}", render_view(&view, &options));

    if let Some(span_id) = &args.select {
        // Spans outside the focused subtree can still be selected.
        let node = view
            .lookup(span_id)
            .or_else(|| view.original_forest().lookup(span_id));
        match node {
            Some(node) => {
                let trace_start = view
                    .first_span_start_time()
                    .or(payload.start_timestamp_millis)
                    .or(view.original_metadata().global_start)
                    .unwrap_or(node.start_time);
                println!();
                print!("{}", render_span_details(&node, trace_start));
            }
            None => tracing::warn!(span_id = %span_id, "selected span not found"),
        }
    }

    Ok(())
}
