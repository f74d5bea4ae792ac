use std::sync::Arc;

use ticket_sentinel::channels::discord::{DiscordHandler, DiscordPlatform, run_gateway};
use ticket_sentinel::config::{
    BotConfig, DEDUP_SWEEP_INTERVAL, INACTIVITY_POLL_INTERVAL, INACTIVITY_SWEEP_INTERVAL,
    PAUSE_SWEEP_INTERVAL, RATE_LIMIT_SWEEP_INTERVAL,
};
use ticket_sentinel::knowledge::KnowledgeBase;
use ticket_sentinel::llm::create_provider;
use ticket_sentinel::pipeline::{
    AnswerService, GiftCardDetector, MessageRouter, RouterConfig, RouterState, SupportPlatform,
};
use ticket_sentinel::state::{spawn_nudge_task, spawn_sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // A missing .env is fine; real environment variables take precedence.
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("🎫 Ticket Sentinel v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Ticket channel: {}", config.ticket_channel_id);
    eprintln!("   Payment channel: {}", config.payment_channel_id);

    run(config).await?;
    Ok(())
}

/// Wire the bot together and run the gateway until it stops.
async fn run(config: BotConfig) -> ticket_sentinel::error::Result<()> {
    // ── Knowledge base ──────────────────────────────────────────────────
    let knowledge = match KnowledgeBase::load(&config.faq_path) {
        Ok(kb) => kb,
        Err(e) => {
            tracing::error!(
                path = %config.faq_path.display(),
                error = %e,
                "Failed to load FAQ corpus, every question will escalate"
            );
            KnowledgeBase::default()
        }
    };
    let knowledge = Arc::new(knowledge);

    // ── Automated answers ───────────────────────────────────────────────
    let answers = match config.llm_config() {
        Some(llm_config) => {
            let llm = create_provider(&llm_config)?;
            eprintln!("   Answers: enabled (model {})", llm_config.model);
            Some(AnswerService::new(llm, Arc::clone(&knowledge)))
        }
        None => {
            eprintln!("   Answers: disabled (OPENAI_API_KEY not set)");
            None
        }
    };

    if config.staff_role_id.is_none() {
        tracing::warn!("STAFF_ROLE_ID not set: staff pause and commands are disabled");
    }

    // ── Platform + router ───────────────────────────────────────────────
    let platform = Arc::new(DiscordPlatform::connect(&config.bot_token).await?);
    let state = RouterState::default();
    let router = Arc::new(MessageRouter::new(
        RouterConfig::from_bot_config(&config),
        platform.clone() as Arc<dyn SupportPlatform>,
        GiftCardDetector::new(&config.gift_card_keywords),
        answers,
        state.clone(),
    ));

    // ── Background tasks ────────────────────────────────────────────────
    let _sweepers = [
        spawn_sweeper(state.rate_limiter.clone(), RATE_LIMIT_SWEEP_INTERVAL),
        spawn_sweeper(state.dedup.clone(), DEDUP_SWEEP_INTERVAL),
        spawn_sweeper(state.pauses.clone(), PAUSE_SWEEP_INTERVAL),
        spawn_sweeper(state.inactivity.clone(), INACTIVITY_SWEEP_INTERVAL),
    ];
    let _nudges = spawn_nudge_task(
        state.inactivity.clone(),
        platform.clone(),
        INACTIVITY_POLL_INTERVAL,
    );

    // ── Gateway ─────────────────────────────────────────────────────────
    let handler = DiscordHandler::new(
        router,
        platform,
        config.payment_channel_id.clone(),
        config.ticket_channel_id.clone(),
    );
    run_gateway(&config.bot_token, handler).await?;

    Ok(())
}
