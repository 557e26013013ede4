use anyhow::Context;
use dotenvy::dotenv;
use regex::Regex;
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use support_router::config::{Settings, ROUTER_TEMPERATURE, SUB_AGENT_TEMPERATURE};
use support_router::llm::{LlmProvider, Message, OpenAiCompatProvider};
use support_router::router::{
    DelegationRouter, LlmRoutingPolicy, QueryContext, RoutingPolicy,
};
use support_router::support::{direct_guidance, support_policy, support_registry, tech_support_sub_agent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use uuid::Uuid;

/// Earlier turns kept for follow-up questions in the interactive session
const MAX_HISTORY_MESSAGES: usize = 10;

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    api_key: Regex,
    bearer: Regex,
    env_key: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            api_key: Regex::new(r"sk-[A-Za-z0-9_-]{8,}")?,
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+")?,
            env_key: Regex::new(r"((?:OPENAI_API_KEY|ROUTER__LLM_API_KEY)=)[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = self.api_key.replace_all(input, "[API_KEY]").to_string();
        output = self.bearer.replace_all(&output, "$1[MASKED]").to_string();
        output = self.env_key.replace_all(&output, "$1[MASKED]").to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's buffer was consumed even if the redacted length differs
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let patterns =
        Arc::new(RedactionPatterns::new().context("Failed to compile redaction patterns")?);
    init_logging(patterns);

    let settings = Settings::new().context("Failed to load configuration")?;
    info!("Configuration loaded successfully.");

    let router = build_router(&settings)?;
    info!(handlers = router.registry().len(), "Support router is ready");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        run_interactive(&router).await
    } else {
        answer(&router, &args.join(" ")).await;
        Ok(())
    }
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let debug_mode = std::env::var("DEBUG_MODE").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let default_level = if debug_mode { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn build_router(settings: &Settings) -> anyhow::Result<DelegationRouter> {
    let today = settings.support_today()?;

    let (policy, tech_agent) = match settings.llm_api_key.as_deref() {
        Some(key) if settings.llm_enabled() => {
            let router_llm: Arc<dyn LlmProvider> = Arc::new(
                OpenAiCompatProvider::new(key.to_string(), &settings.llm_api_base)
                    .with_temperature(ROUTER_TEMPERATURE),
            );
            let agent_llm: Arc<dyn LlmProvider> = Arc::new(
                OpenAiCompatProvider::new(key.to_string(), &settings.llm_api_base)
                    .with_temperature(SUB_AGENT_TEMPERATURE),
            );
            let policy: Arc<dyn RoutingPolicy> = Arc::new(
                LlmRoutingPolicy::new(router_llm, direct_guidance())
                    .with_model(settings.router_model.clone())
                    .with_max_tokens(settings.llm_max_tokens),
            );
            let agent = tech_support_sub_agent(
                agent_llm,
                settings.sub_agent_model.clone(),
                settings.llm_max_tokens,
            );
            info!(model = %settings.router_model, "Using LLM routing policy");
            (policy, Some(agent))
        }
        _ => {
            warn!("No LLM API key configured, using keyword routing");
            let policy: Arc<dyn RoutingPolicy> = Arc::new(support_policy());
            (policy, None)
        }
    };

    let registry = support_registry(today, tech_agent).context("Invalid support catalog")?;
    Ok(DelegationRouter::from_settings(
        Arc::new(registry),
        policy,
        settings,
    ))
}

async fn answer(router: &DelegationRouter, query: &str) {
    let context = QueryContext::new().with_session(Uuid::new_v4().to_string());
    let routed = route_interruptibly(router, query, context, tokio::signal::ctrl_c());
    if let Some(text) = routed.await {
        println!("{text}");
    }
}

/// Route one query; `interrupt` completing cancels this request only
async fn route_interruptibly<F: Future>(
    router: &DelegationRouter,
    query: &str,
    context: QueryContext,
    interrupt: F,
) -> Option<String> {
    let token = CancellationToken::new();
    let context = context.with_cancellation(token.clone());
    let routed = router.route(query, &context);
    tokio::pin!(routed);
    let envelope = tokio::select! {
        envelope = &mut routed => envelope,
        _ = interrupt => {
            token.cancel();
            let envelope = routed.await;
            info!(request_id = %envelope.request_id(), "Request interrupted");
            return None;
        }
    };
    Some(envelope.presented_text().to_string())
}

async fn run_interactive(router: &DelegationRouter) -> anyhow::Result<()> {
    let session_id = Uuid::new_v4().to_string();
    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Customer support is ready. Type your question, or an empty line to quit.");
    loop {
        print!("> ");
        io::stdout().flush()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        };
        let Some(line) = line else { break };
        let query = line.trim();
        if query.is_empty() {
            break;
        }
        let context = QueryContext::new()
            .with_session(session_id.clone())
            .with_history(history.clone());
        let reply = route_interruptibly(router, query, context, tokio::signal::ctrl_c());
        let Some(reply) = reply.await else {
            println!("(request cancelled)");
            continue;
        };
        println!("{reply}");
        history.push(Message::user(query));
        history.push(Message::assistant(&reply));
        let excess = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
        history.drain(..excess);
    }
    Ok(())
}
