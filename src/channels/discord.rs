//! Discord via serenity: the REST side implements [`SupportPlatform`], the
//! gateway side feeds events into the [`MessageRouter`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serenity::all::{
    Channel, ChannelId, Client, Context, CreateMessage, EventHandler, GatewayIntents, GetMessages,
    GuildChannel, Http, Message, MessageId, Ready, Timestamp,
};
use tracing::{debug, error, info, warn};

use crate::error::ChannelError;
use crate::pipeline::router::MessageRouter;
use crate::pipeline::types::{
    ChannelInfo, HistoryMessage, InboundMessage, MessageAuthor, SupportPlatform, ThreadOpened,
};

/// Parse a snowflake string into a serenity id.
fn parse_id(id: &str) -> Result<u64, ChannelError> {
    id.parse::<u64>()
        .ok()
        .filter(|v| *v != 0)
        .ok_or_else(|| ChannelError::InvalidId(id.to_string()))
}

fn channel_id(id: &str) -> Result<ChannelId, ChannelError> {
    parse_id(id).map(ChannelId::new)
}

fn to_utc(ts: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}

/// REST client for one bot account.
pub struct DiscordPlatform {
    http: Arc<Http>,
    bot_user_id: String,
}

impl DiscordPlatform {
    /// Build the REST client and resolve the bot's own user id.
    pub async fn connect(token: &SecretString) -> Result<Self, ChannelError> {
        let http = Arc::new(Http::new(token.expose_secret()));
        let me = http
            .get_current_user()
            .await
            .map_err(|e| ChannelError::Gateway(format!("failed to resolve bot user: {e}")))?;
        info!(bot_user = %me.name, bot_user_id = %me.id, "Discord REST client ready");
        Ok(Self {
            http,
            bot_user_id: me.id.to_string(),
        })
    }
}

#[async_trait]
impl SupportPlatform for DiscordPlatform {
    fn name(&self) -> &str {
        "discord"
    }

    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn fetch_channel(&self, id: &str) -> Result<ChannelInfo, ChannelError> {
        let channel = channel_id(id)?
            .to_channel(&*self.http)
            .await
            .map_err(|e| ChannelError::FetchFailed {
                id: id.to_string(),
                what: "channel".to_string(),
                reason: e.to_string(),
            })?;
        let name = match channel {
            Channel::Guild(gc) => Some(gc.name),
            _ => None,
        };
        Ok(ChannelInfo {
            id: id.to_string(),
            name,
        })
    }

    async fn send(&self, id: &str, text: &str) -> Result<(), ChannelError> {
        channel_id(id)?
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::SendFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn reply(&self, message: &InboundMessage, text: &str) -> Result<(), ChannelError> {
        let channel = channel_id(&message.channel_id)?;
        let message_id = MessageId::new(parse_id(&message.id)?);
        let builder = CreateMessage::new()
            .content(text)
            .reference_message((channel, message_id));
        channel
            .send_message(&self.http, builder)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::SendFailed {
                id: message.channel_id.clone(),
                reason: e.to_string(),
            })
    }

    async fn delete(&self, message: &InboundMessage) -> Result<(), ChannelError> {
        let message_id = MessageId::new(parse_id(&message.id)?);
        channel_id(&message.channel_id)?
            .delete_message(&self.http, message_id)
            .await
            .map_err(|e| ChannelError::DeleteFailed {
                id: message.channel_id.clone(),
                message_id: message.id.clone(),
                reason: e.to_string(),
            })
    }

    async fn recent_messages(
        &self,
        id: &str,
        limit: u8,
    ) -> Result<Vec<HistoryMessage>, ChannelError> {
        let messages = channel_id(id)?
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|e| ChannelError::FetchFailed {
                id: id.to_string(),
                what: "messages".to_string(),
                reason: e.to_string(),
            })?;
        Ok(messages
            .into_iter()
            .map(|m| HistoryMessage {
                id: m.id.to_string(),
                author_id: m.author.id.to_string(),
                content: m.content,
                sent_at: to_utc(m.timestamp),
            })
            .collect())
    }
}

/// Gateway event handler.
pub struct DiscordHandler {
    router: Arc<MessageRouter>,
    platform: Arc<DiscordPlatform>,
    payment_channel_id: String,
    ticket_channel_id: String,
}

impl DiscordHandler {
    pub fn new(
        router: Arc<MessageRouter>,
        platform: Arc<DiscordPlatform>,
        payment_channel_id: impl Into<String>,
        ticket_channel_id: impl Into<String>,
    ) -> Self {
        Self {
            router,
            platform,
            payment_channel_id: payment_channel_id.into(),
            ticket_channel_id: ticket_channel_id.into(),
        }
    }

    /// Convert a gateway message. Thread parent and roles need extra lookups,
    /// skipped for bot authors since the router drops them anyway.
    async fn to_inbound(&self, ctx: &Context, msg: &Message) -> InboundMessage {
        let mut inbound = InboundMessage {
            id: msg.id.to_string(),
            channel_id: msg.channel_id.to_string(),
            parent_channel_id: None,
            guild_id: msg.guild_id.map(|g| g.to_string()),
            author: MessageAuthor {
                id: msg.author.id.to_string(),
                tag: msg.author.tag(),
                is_bot: msg.author.bot,
                role_ids: Vec::new(),
            },
            content: msg.content.clone(),
            received_at: to_utc(msg.timestamp),
        };
        if msg.author.bot {
            return inbound;
        }

        inbound.parent_channel_id = match msg.channel_id.to_channel(ctx).await {
            Ok(Channel::Guild(gc)) if gc.thread_metadata.is_some() => {
                gc.parent_id.map(|p| p.to_string())
            }
            Ok(_) => None,
            Err(e) => {
                debug!(channel_id = %msg.channel_id, error = %e, "Could not resolve message channel");
                None
            }
        };

        inbound.author.role_ids = match (&msg.member, msg.guild_id) {
            (Some(member), _) => member.roles.iter().map(|r| r.to_string()).collect(),
            (None, Some(guild_id)) => match ctx.http.get_member(guild_id, msg.author.id).await {
                Ok(member) => member.roles.iter().map(|r| r.to_string()).collect(),
                Err(e) => {
                    warn!(user_id = %msg.author.id, error = %e, "Failed to fetch member roles");
                    Vec::new()
                }
            },
            (None, None) => Vec::new(),
        };

        inbound
    }

    async fn log_channel(&self, label: &str, id: &str) {
        match self.platform.fetch_channel(id).await {
            Ok(channel) => info!(
                channel_id = %id,
                name = channel.name.as_deref().unwrap_or("-"),
                "{label} channel resolved"
            ),
            Err(e) => error!(channel_id = %id, error = %e, "{label} channel not found"),
        }
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "Connected to Discord gateway"
        );
        self.log_channel("Payment", &self.payment_channel_id).await;
        self.log_channel("Ticket", &self.ticket_channel_id).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let inbound = self.to_inbound(&ctx, &msg).await;
        self.router.route(&inbound).await;
    }

    async fn thread_create(&self, _ctx: Context, thread: GuildChannel) {
        let event = ThreadOpened {
            thread_id: thread.id.to_string(),
            parent_channel_id: thread.parent_id.map(|p| p.to_string()),
            owner_id: thread.owner_id.map(|o| o.to_string()),
        };
        self.router.thread_opened(&event).await;
    }
}

/// Connect to the gateway and process events until the connection ends.
pub async fn run_gateway(token: &SecretString, handler: DiscordHandler) -> Result<(), ChannelError> {
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(token.expose_secret(), intents)
        .event_handler(handler)
        .await
        .map_err(|e| ChannelError::Gateway(format!("failed to build client: {e}")))?;

    client
        .start()
        .await
        .map_err(|e| ChannelError::Gateway(e.to_string()))
}
