mod menu;

use anyhow::{anyhow, Result};
use menu::{Button, Reply};
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, WebAppInfo},
    utils::command::BotCommands,
};
use tracing::{error, info};
use url::Url;

#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Menu,
    Help,
}

impl Command {
    fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Menu => "menu",
            Command::Help => "help",
        }
    }
}

fn button(button: &Button) -> Result<InlineKeyboardButton, url::ParseError> {
    Ok(match *button {
        Button::WebApp { text, url } => InlineKeyboardButton::web_app(
            text,
            WebAppInfo {
                url: Url::parse(url)?,
            },
        ),
        Button::Callback { text, data } => InlineKeyboardButton::callback(text, data),
        Button::Link { text, url } => InlineKeyboardButton::url(text, Url::parse(url)?),
    })
}

fn markup(keyboard: &[Vec<Button>]) -> Result<InlineKeyboardMarkup, url::ParseError> {
    let rows = keyboard
        .iter()
        .map(|row| row.iter().map(button).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(InlineKeyboardMarkup::new(rows))
}

#[allow(deprecated)]
async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> Result<()> {
    bot.send_message(chat_id, reply.text.as_str())
        .parse_mode(ParseMode::Markdown)
        .reply_markup(markup(&reply.keyboard)?)
        .await?;
    Ok(())
}

/// Sends `reply`, falling back to a plain apology when delivery fails.
async fn deliver(bot: &Bot, chat_id: ChatId, reply: Option<Reply>) -> ResponseResult<()> {
    let Some(reply) = reply else {
        return Ok(());
    };
    if let Err(err) = send_reply(bot, chat_id, &reply).await {
        error!(chat_id = chat_id.0, "reply failed: {:#}", err);
        bot.send_message(chat_id, menu::APOLOGY).await?;
    }
    Ok(())
}

async fn on_command(bot: Bot, msg: Message, command: Command) -> ResponseResult<()> {
    deliver(&bot, msg.chat.id, menu::command_reply(command.name())).await
}

async fn on_callback(bot: Bot, query: CallbackQuery) -> ResponseResult<()> {
    bot.answer_callback_query(query.id.clone()).await?;
    let chat_id = query.message.as_ref().map(|message| message.chat().id);
    match (query.data.as_deref(), chat_id) {
        (Some(data), Some(chat_id)) => deliver(&bot, chat_id, menu::callback_reply(data)).await,
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = std::env::var("BOT_TOKEN")
        .ok()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| anyhow!("BOT_TOKEN must be provided in environment variables"))?;
    let bot = Bot::new(token);

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(on_command),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback));

    info!("{} PageSwap Bot is running...", menu::LOGO);
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    info!("{} PageSwap Bot stopped", menu::LOGO);
    Ok(())
}
