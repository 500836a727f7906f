// tests/app_config.rs
use market_news_relay::config::{
    AppConfig, ENV_API_BASE, ENV_BOT_TOKEN, ENV_CHAT_ID, ENV_FILTERS_PATH, ENV_INTERVAL_MINUTES,
    ENV_SOURCES_PATH,
};
use std::env;
use std::path::PathBuf;

const ALL: [&str; 6] = [
    ENV_BOT_TOKEN,
    ENV_CHAT_ID,
    ENV_INTERVAL_MINUTES,
    ENV_SOURCES_PATH,
    ENV_FILTERS_PATH,
    ENV_API_BASE,
];

fn clear() {
    for k in ALL {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn reads_process_environment() {
    clear();
    env::set_var(ENV_BOT_TOKEN, "123:abc");
    env::set_var(ENV_CHAT_ID, "-1001234");
    env::set_var(ENV_INTERVAL_MINUTES, "5");
    env::set_var(ENV_SOURCES_PATH, "/etc/relay/sources.json");
    env::set_var(ENV_API_BASE, "http://127.0.0.1:8081");

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.bot_token, "123:abc");
    assert_eq!(cfg.chat_id, "-1001234");
    assert_eq!(cfg.interval_minutes, 5);
    assert_eq!(cfg.sources_path, PathBuf::from("/etc/relay/sources.json"));
    assert_eq!(cfg.filters_path, PathBuf::from("news_filters.json"));
    assert_eq!(cfg.telegram_api_base, "http://127.0.0.1:8081");
    clear();
}

#[serial_test::serial]
#[test]
fn missing_token_is_fatal() {
    clear();
    env::set_var(ENV_CHAT_ID, "1");
    let err = AppConfig::from_env().unwrap_err();
    assert!(err.to_string().contains(ENV_BOT_TOKEN));
    clear();
}
