use chrono::Local;
use image_label_bot::application::label_usecase::LabelBot;
use image_label_bot::config::Config;
use image_label_bot::domain::labeling_service::LabelError;
use image_label_bot::infrastructure::google_auth::ServiceAccountTokens;
use image_label_bot::infrastructure::google_vision::GoogleVisionLabeler;
use image_label_bot::infrastructure::sqlite_quota_store::SqliteQuotaStore;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::PhotoSize;
use teloxide::utils::command::BotCommands;
use tokio::sync::Semaphore;

const STORAGE_FAILURE_MESSAGE: &str = "Something went wrong. Please try again later.";
const HINT_MESSAGE: &str = "📷 Send me a photo and I will describe what is on it.";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "Supported commands:")]
enum Command {
    #[command(description = "show the welcome message and the daily limit")]
    Start,
    #[command(description = "show the total number of users")]
    UserCount,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    // Both secrets are checked before anything else starts.
    let config = Config::from_env()?;

    // 1. Quota table (SQLite)
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = SqliteQuotaStore::new(pool);
    store.init().await?;

    // 2. Vision client, authorized with the service-account key
    let http = reqwest::Client::builder()
        .timeout(config.vision_timeout)
        .build()?;
    let tokens = ServiceAccountTokens::from_file(&config.credentials_path, http.clone()).await?;
    log::info!("Using service account {}", tokens.client_email());
    let labeler = GoogleVisionLabeler::new(http, &config.vision_endpoint, Arc::new(tokens));

    let label_bot = Arc::new(LabelBot::new(
        Arc::new(store),
        Arc::new(labeler),
        Arc::new(Semaphore::new(config.max_concurrent_labeling)),
        config.support_contact.clone(),
    ));

    let bot = Bot::new(&config.bot_token);
    bot.set_my_commands(Command::bot_commands()).await?;

    // 3. Handler tree
    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo))
        .branch(dptree::endpoint(handle_other));

    log::info!("🚀 Image label bot started");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![label_bot])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .map(|user| user.id.0 as i64)
        .unwrap_or(msg.chat.id.0)
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    label_bot: Arc<LabelBot>,
) -> ResponseResult<()> {
    let result = match cmd {
        Command::Start => {
            label_bot
                .handle_start(sender_id(&msg), Local::now().date_naive())
                .await
        }
        Command::UserCount => label_bot.handle_user_count().await,
    };
    reply(&bot, &msg, result).await
}

async fn handle_photo(bot: Bot, msg: Message, label_bot: Arc<LabelBot>) -> ResponseResult<()> {
    // Telegram lists sizes smallest first.
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()).cloned() else {
        return Ok(());
    };

    let result = label_bot
        .handle_photo(
            sender_id(&msg),
            Local::now().date_naive(),
            download_photo(&bot, &photo),
        )
        .await;
    reply(&bot, &msg, result).await
}

async fn handle_other(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, HINT_MESSAGE).await?;
    Ok(())
}

async fn download_photo(bot: &Bot, photo: &PhotoSize) -> Result<Vec<u8>, LabelError> {
    let file = bot
        .get_file(photo.file.id.clone())
        .await
        .map_err(|e| LabelError::Download(e.to_string()))?;

    let mut content = Vec::new();
    bot.download_file(&file.path, &mut content)
        .await
        .map_err(|e| LabelError::Download(e.to_string()))?;
    Ok(content)
}

async fn reply(
    bot: &Bot,
    msg: &Message,
    result: Result<String, sqlx::Error>,
) -> ResponseResult<()> {
    let text = match result {
        Ok(text) => text,
        Err(e) => {
            log::error!("Storage error while handling chat {}: {}", msg.chat.id.0, e);
            STORAGE_FAILURE_MESSAGE.to_string()
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
