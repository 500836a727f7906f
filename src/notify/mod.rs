pub mod dispatcher;
pub mod telegram;

use crate::ingest::types::NewsItem;
use async_trait::async_trait;
use chrono::FixedOffset;

/// Delivery target for one formatted item. One call, one message, no retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, item: &NewsItem) -> anyhow::Result<()>;
    fn name(&self) -> &'static str;
}

/// Samara, UTC+4 all year.
const DISPLAY_OFFSET_SECS: i32 = 4 * 3600;

pub fn priority_emoji(priority: u8) -> &'static str {
    match priority {
        1 => "🚨",
        2 => "⚡",
        3 => "📊",
        _ => "📰",
    }
}

pub fn category_emoji(category: &str) -> &'static str {
    match category {
        "ЦБ РФ" => "🏦",
        "Кремль" => "🏛️",
        "РБК" => "📺",
        "Интерфакс" => "📡",
        "Ведомости" => "📰",
        "Коммерсант" => "💼",
        "Финмаркет" => "📈",
        "Банки.ру" => "🏧",
        _ => "📰",
    }
}

/// Telegram HTML body for one item.
pub fn format_news_message(item: &NewsItem) -> String {
    let clock = match FixedOffset::east_opt(DISPLAY_OFFSET_SECS) {
        Some(tz) => item.timestamp.with_timezone(&tz).format("%H:%M:%S").to_string(),
        None => item.timestamp.format("%H:%M:%S").to_string(),
    };
    let mirror_note = if item.via_mirror { " · via зеркало" } else { "" };

    format!(
        "{} {} <b>{}</b>{}\n\n{}\n\n🔗 {}\n⏰ {}",
        priority_emoji(item.priority),
        category_emoji(&item.category),
        html_escape::encode_text(&item.source),
        mirror_note,
        html_escape::encode_text(&item.title),
        html_escape::encode_text(&item.url),
        clock,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item() -> NewsItem {
        NewsItem {
            title: "Сбербанк & ВТБ <снизили> ставки".into(),
            url: "https://www.interfax.ru/business/1".into(),
            source: "Интерфакс".into(),
            priority: 2,
            category: "Интерфакс".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 7).unwrap(),
            fingerprint: "fp".into(),
            via_mirror: false,
        }
    }

    #[test]
    fn message_layout() {
        let msg = format_news_message(&item());
        assert_eq!(
            msg,
            "⚡ 📡 <b>Интерфакс</b>\n\nСбербанк &amp; ВТБ &lt;снизили&gt; ставки\n\n\
             🔗 https://www.interfax.ru/business/1\n⏰ 13:05:07"
        );
    }

    #[test]
    fn mirror_note_and_fallback_emoji() {
        let mut it = item();
        it.via_mirror = true;
        it.priority = 4;
        it.category = "Прочее".into();
        let msg = format_news_message(&it);
        assert!(msg.starts_with("📰 📰 <b>Интерфакс</b> · via зеркало\n"));
    }

    #[test]
    fn link_is_escaped_like_the_text() {
        let mut it = item();
        it.url = "https://www.rbc.ru/news?id=1&utm_source=<rss>".into();
        let msg = format_news_message(&it);
        assert!(
            msg.contains("🔗 https://www.rbc.ru/news?id=1&amp;utm_source=&lt;rss&gt;\n"),
            "{msg}"
        );
    }

    #[test]
    fn time_wraps_past_midnight() {
        let mut it = item();
        it.timestamp = Utc.with_ymd_and_hms(2025, 3, 14, 22, 30, 0).unwrap();
        assert!(format_news_message(&it).ends_with("⏰ 02:30:00"));
    }
}
