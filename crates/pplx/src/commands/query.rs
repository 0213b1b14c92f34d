//! Query command - one question, one answer.

use std::io::{self, IsTerminal, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use pplx_config::QueryDefaults;
use pplx_core::{
    CompiledRequest, CompletionResponse, Dispatcher, IncrementalRenderer, ParameterSet, Sink,
    ValidationError, compile, format, validate,
};

use super::{Context, build_transport};

/// Arguments for the query command.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// The question to ask. Read from stdin when omitted or `-`
    pub prompt: Option<String>,

    /// Model name (sonar, sonar-pro, sonar-reasoning, sonar-deep-research, ...)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    // ── Sampling ────────────────────────────────────────────────────────
    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Top-K sampling (0 disables)
    #[arg(long)]
    pub top_k: Option<u32>,

    /// Nucleus sampling
    #[arg(long)]
    pub top_p: Option<f64>,

    /// Frequency penalty
    #[arg(long)]
    pub frequency_penalty: Option<f64>,

    /// Presence penalty
    #[arg(long)]
    pub presence_penalty: Option<f64>,

    /// Maximum output tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    // ── Search filters ──────────────────────────────────────────────────
    /// Restrict search to these domains (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub search_domains: Vec<String>,

    /// Only use results from this period: hour, day, week, month, year
    #[arg(long)]
    pub search_recency: Option<String>,

    /// Latitude hint for localised search
    #[arg(long, allow_negative_numbers = true)]
    pub location_lat: Option<f64>,

    /// Longitude hint for localised search
    #[arg(long, allow_negative_numbers = true)]
    pub location_lon: Option<f64>,

    /// Country code hint, e.g. US
    #[arg(long)]
    pub location_country: Option<String>,

    /// Search corpus: web or academic
    #[arg(long)]
    pub search_mode: Option<String>,

    /// Search context size: low, medium or high
    #[arg(long)]
    pub search_context_size: Option<String>,

    /// Only results published after this date (MM/DD/YYYY)
    #[arg(long)]
    pub search_after_date: Option<String>,

    /// Only results published before this date (MM/DD/YYYY)
    #[arg(long)]
    pub search_before_date: Option<String>,

    /// Only results updated after this date (MM/DD/YYYY)
    #[arg(long)]
    pub last_updated_after: Option<String>,

    /// Only results updated before this date (MM/DD/YYYY)
    #[arg(long)]
    pub last_updated_before: Option<String>,

    // ── Response ────────────────────────────────────────────────────────
    /// Include images (disables the recency filter)
    #[arg(long)]
    pub return_images: bool,

    /// Include related questions
    #[arg(long)]
    pub return_related: bool,

    /// Stream the answer as it is generated
    #[arg(short, long)]
    pub stream: bool,

    /// Restrict images to these domains (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub image_domains: Vec<String>,

    /// Restrict images to these formats (comma separated), e.g. png,jpg
    #[arg(long, value_delimiter = ',')]
    pub image_formats: Vec<String>,

    /// JSON schema the answer must follow (sonar models only)
    #[arg(long)]
    pub response_format_json_schema: Option<String>,

    /// Regex the answer must match (sonar models only)
    #[arg(long)]
    pub response_format_regex: Option<String>,

    /// Reasoning depth for deep-research models: low, medium or high
    #[arg(long)]
    pub reasoning_effort: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl QueryArgs {
    /// The flags that were given, as an override layer over config defaults.
    ///
    /// Switches and lists left at their clap defaults do not override.
    pub fn overrides(&self) -> QueryDefaults {
        let list = |values: &Vec<String>| {
            let values: Vec<String> = values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            (!values.is_empty()).then_some(values)
        };

        QueryDefaults {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            max_tokens: self.max_tokens,
            search_domains: list(&self.search_domains),
            search_recency: self.search_recency.clone(),
            location_lat: self.location_lat,
            location_lon: self.location_lon,
            location_country: self.location_country.clone(),
            return_images: self.return_images.then_some(true),
            return_related: self.return_related.then_some(true),
            stream: self.stream.then_some(true),
            image_domains: list(&self.image_domains),
            image_formats: list(&self.image_formats),
            response_format_json_schema: self.response_format_json_schema.clone(),
            response_format_regex: self.response_format_regex.clone(),
            search_mode: self.search_mode.clone(),
            search_context_size: self.search_context_size.clone(),
            search_after_date: self.search_after_date.clone(),
            search_before_date: self.search_before_date.clone(),
            last_updated_after: self.last_updated_after.clone(),
            last_updated_before: self.last_updated_before.clone(),
            reasoning_effort: self.reasoning_effort.clone(),
        }
    }
}

/// Run the query command.
pub async fn run(args: QueryArgs, ctx: &Context) -> Result<()> {
    let prompt = read_prompt(args.prompt.as_deref())?;
    let loaded = ctx.load_config()?;
    let params = loaded
        .config
        .defaults
        .layered(args.overrides())
        .to_parameter_set(prompt);

    // Bad input fails here, before a client is built or the network touched
    let request = prepare(&params)?;

    let transport = build_transport(&loaded, args.timeout)?;
    let dispatcher = Dispatcher::new(transport);

    if ctx.verbose {
        let dim = Style::new().dim().for_stderr();
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "Model: {} | {} directives | streaming: {}",
                params.model,
                request.directives.len(),
                params.stream
            ))
        );
    }

    if ctx.json_output {
        let response = dispatcher.dispatch(&request, params.stream).await?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", format(&response, Sink::Json))?;
        return Ok(());
    }

    if params.stream {
        let response = stream_to_stdout(&dispatcher, &request).await?;
        let mut stdout = io::stdout().lock();
        if !response.content().ends_with('\n') {
            writeln!(stdout)?;
        }
        write!(
            stdout,
            "{}",
            format(&response, Sink::Text { include_content: false })
        )?;
        stdout.flush()?;
        return Ok(());
    }

    let spinner = Term::stderr().is_term().then(|| spinner(&params.model));
    let outcome = dispatcher.dispatch(&request, false).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let response = outcome?;

    let mut stdout = io::stdout().lock();
    write!(
        stdout,
        "{}",
        format(&response, Sink::Text { include_content: true })
    )?;
    stdout.flush()?;
    Ok(())
}

/// Validate and compile the parameter set.
fn prepare(params: &ParameterSet) -> Result<CompiledRequest> {
    validate(params).map_err(pplx_core::Error::from)?;
    let request = compile(params).map_err(pplx_core::Error::from)?;
    Ok(request)
}

/// Resolve the prompt argument, reading stdin for `None` or `-`.
fn read_prompt(arg: Option<&str>) -> Result<String> {
    let prompt = match arg {
        Some(prompt) if prompt != "-" => prompt.to_string(),
        _ => {
            if io::stdin().is_terminal() {
                eprintln!("Reading question from stdin (end with Ctrl-D)...");
            }
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading prompt from stdin")?;
            buf
        }
    };

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(pplx_core::Error::from(ValidationError::new(
            "user_prompt",
            "",
            "must not be empty",
        ))
        .into());
    }
    Ok(prompt.to_string())
}

/// Render a streaming answer to stdout as it grows.
async fn stream_to_stdout(
    dispatcher: &Dispatcher,
    request: &CompiledRequest,
) -> Result<CompletionResponse> {
    let write_error: Arc<Mutex<Option<io::Error>>> = Arc::new(Mutex::new(None));
    let observer_error = Arc::clone(&write_error);
    let mut renderer = IncrementalRenderer::new();

    let observer = move |response: &CompletionResponse| {
        let Ok(mut slot) = observer_error.lock() else {
            return;
        };
        if slot.is_some() {
            return;
        }
        let mut out = io::stdout().lock();
        if let Err(e) = renderer.write_suffix(response.content(), &mut out) {
            tracing::warn!(error = %e, "Failed to write streamed answer");
            *slot = Some(e);
        }
    };

    let response = dispatcher.dispatch_with_observer(request, observer).await?;

    let failed = write_error.lock().ok().and_then(|mut slot| slot.take());
    if let Some(e) = failed {
        return Err(anyhow::Error::new(e).context("writing answer to stdout"));
    }
    Ok(response)
}

fn spinner(model: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Asking {}...", model));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
