//! Telegram update routing.
//!
//! The handler tree built by [`schema`] is the bot's entire surface:
//! commands, pasted links, free-text search and inline keyboard
//! callbacks. Handlers stay thin; everything past parsing the update
//! is delegated to [`DownloadManager`] and the stores.

use std::sync::Arc;

use teloxide::{
    dispatching::{UpdateFilterExt, UpdateHandler},
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, Message},
    utils::command::BotCommands,
};

use crate::{
    cache::DownloadCache,
    download::DownloadManager,
    link,
    providers::ForeignProvider,
    settings::{Quality, SettingsStore, UserSettings},
};

/// Boxed error type for the dispatcher; endpoints fold their own
/// failures into log lines and user-facing messages instead.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Maximum hits shown for a free-text search.
const SEARCH_LIMIT: u32 = 5;

/// Rows shown by `/history`.
const HISTORY_LIMIT: u32 = 10;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "show download settings")]
    Settings,
    #[command(description = "show recent downloads")]
    History,
}

/// Shared handler dependencies, cloned into each branch.
#[derive(Clone)]
pub struct BotDeps {
    pub manager: Arc<DownloadManager>,
    pub settings: Arc<SettingsStore>,
    pub cache: Arc<DownloadCache>,
    pub foreign: Arc<dyn ForeignProvider>,
}

/// Builds the bot's handler tree.
///
/// The same schema serves production and integration tests; it carries
/// no state of its own beyond the injected [`BotDeps`].
pub fn schema(deps: BotDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callbacks = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callbacks))
}

fn command_handler(deps: BotDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                debug!("command {cmd:?} from chat {}", msg.chat.id);
                let user_id = msg.chat.id.0;
                register(&deps, user_id, &msg);
                match cmd {
                    Command::Start => {
                        bot.send_message(msg.chat.id, WELCOME).await?;
                    }
                    Command::Help => {
                        let text = format!("{WELCOME}\n\n{}", Command::descriptions());
                        bot.send_message(msg.chat.id, text).await?;
                    }
                    Command::Settings => {
                        show_settings(&bot, &deps, user_id).await?;
                    }
                    Command::History => {
                        show_history(&bot, &deps, user_id).await?;
                    }
                }
                Ok(())
            }
        },
    ))
}

fn message_handler(deps: BotDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let text = msg.text().unwrap_or_default().trim().to_owned();
                let user_id = msg.chat.id.0;
                register(&deps, user_id, &msg);

                if link::is_valid_url(&text) {
                    handle_link(&bot, &deps, user_id, &text).await?;
                } else {
                    handle_search(&bot, &deps, user_id, &text).await?;
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: BotDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let user_id = i64::try_from(q.from.id.0).unwrap_or_default();
            let data = q.data.clone().unwrap_or_default();
            bot.answer_callback_query(q.id.clone()).await?;

            if let Some(quality) = data.strip_prefix("quality:") {
                match quality.parse::<Quality>() {
                    Ok(quality) => {
                        if let Err(e) = deps.settings.set_quality(user_id, quality) {
                            error!("setting quality for {user_id}: {e}");
                        }
                        show_settings(&bot, &deps, user_id).await?;
                    }
                    Err(e) => warn!("callback with unknown quality {quality:?}: {e}"),
                }
            } else if data == "bundle:toggle" {
                if let Err(e) = deps.settings.toggle_bundle(user_id) {
                    error!("toggling bundle for {user_id}: {e}");
                }
                show_settings(&bot, &deps, user_id).await?;
            } else if let Some(track_id) = data.strip_prefix("dl:") {
                // Search hits are Spotify tracks; route them through the
                // same flow a pasted link would take.
                let url = format!("https://open.spotify.com/track/{track_id}");
                handle_link(&bot, &deps, user_id, &url).await?;
            } else {
                warn!("unhandled callback data {data:?} from {user_id}");
            }
            Ok(())
        }
    })
}

const WELCOME: &str = "Hi! Send me a Deezer or Spotify link (track, album or playlist) \
                       and I'll send back the audio. Plain text is treated as a track \
                       search.";

/// Records the user on first contact. Failures never block a request.
fn register(deps: &BotDeps, user_id: i64, msg: &Message) {
    let username = msg.from.as_ref().and_then(|user| user.username.as_deref());
    if let Err(e) = deps.settings.register_user(user_id, username) {
        warn!("registering user {user_id}: {e}");
    }
}

/// Runs one download request, bracketed by a status message.
async fn handle_link(
    bot: &Bot,
    deps: &BotDeps,
    user_id: i64,
    url: &str,
) -> Result<(), HandlerError> {
    let chat = ChatId(user_id);
    let status = bot.send_message(chat, "\u{23f3} Working on it...").await?;

    let outcome = deps.manager.process_request(user_id, url).await;
    info!(
        "request from {user_id} finished: success={} ({})",
        outcome.success, outcome.message
    );

    bot.delete_message(chat, status.id).await.ok();
    bot.send_message(chat, outcome.message).await?;
    Ok(())
}

/// Free-text search: top Spotify track hits as an inline keyboard.
async fn handle_search(
    bot: &Bot,
    deps: &BotDeps,
    user_id: i64,
    query: &str,
) -> Result<(), HandlerError> {
    let chat = ChatId(user_id);
    if query.is_empty() {
        bot.send_message(chat, "Send a link or a search query.").await?;
        return Ok(());
    }

    let tracks = match deps.foreign.search_tracks(query, SEARCH_LIMIT).await {
        Ok(tracks) => tracks,
        Err(e) => {
            error!("searching {query:?} for {user_id}: {e}");
            bot.send_message(chat, "Search is unavailable right now.").await?;
            return Ok(());
        }
    };

    if tracks.is_empty() {
        bot.send_message(chat, format!("No tracks found for \"{query}\"."))
            .await?;
        return Ok(());
    }

    let rows: Vec<Vec<InlineKeyboardButton>> = tracks
        .iter()
        .map(|track| {
            vec![InlineKeyboardButton::callback(
                format!("{} \u{2014} {}", track.artist, track.title),
                format!("dl:{}", track.id),
            )]
        })
        .collect();

    bot.send_message(chat, format!("Results for \"{query}\":"))
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

/// Current settings with inline buttons to change them.
async fn show_settings(bot: &Bot, deps: &BotDeps, user_id: i64) -> Result<(), HandlerError> {
    let settings = deps.settings.get(user_id).unwrap_or_else(|e| {
        warn!("loading settings for {user_id}: {e}; showing defaults");
        UserSettings::defaults()
    });

    let text = format!(
        "Quality: {}\nAlbums and playlists as archive: {}",
        settings.quality,
        if settings.bundle { "yes" } else { "no" },
    );

    let quality_row = [Quality::MP3_128, Quality::MP3_320, Quality::FLAC]
        .into_iter()
        .map(|quality| {
            let label = if quality == settings.quality {
                format!("\u{2705} {quality}")
            } else {
                quality.to_string()
            };
            InlineKeyboardButton::callback(label, format!("quality:{quality}"))
        })
        .collect::<Vec<_>>();

    let bundle_row = vec![InlineKeyboardButton::callback(
        if settings.bundle {
            "Send individual tracks"
        } else {
            "Send as archive"
        },
        "bundle:toggle",
    )];

    bot.send_message(ChatId(user_id), text)
        .reply_markup(InlineKeyboardMarkup::new([quality_row, bundle_row]))
        .await?;
    Ok(())
}

/// Most recent downloads, newest first.
async fn show_history(bot: &Bot, deps: &BotDeps, user_id: i64) -> Result<(), HandlerError> {
    let chat = ChatId(user_id);
    let recent = match deps.cache.recent(user_id, HISTORY_LIMIT) {
        Ok(recent) => recent,
        Err(e) => {
            error!("loading history for {user_id}: {e}");
            bot.send_message(chat, "History is unavailable right now.").await?;
            return Ok(());
        }
    };

    if recent.is_empty() {
        bot.send_message(chat, "No downloads yet.").await?;
        return Ok(());
    }

    let mut text = String::from("Your recent downloads:\n");
    for artifact in &recent {
        if artifact.artist.is_empty() {
            text.push_str(&format!("\n\u{2022} {}", artifact.title));
        } else {
            text.push_str(&format!(
                "\n\u{2022} {} \u{2014} {}",
                artifact.artist, artifact.title
            ));
        }
    }
    bot.send_message(chat, text).await?;
    Ok(())
}
