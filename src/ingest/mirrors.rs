// src/ingest/mirrors.rs
use crate::sources::Source;

const RBC: &[&str] = &[
    "https://rssexport.rbc.ru/rbcnews/news/30/full.rss",
    "https://news.google.com/rss/search?q=site:rbc.ru&hl=ru&gl=RU&ceid=RU:ru",
];
const MOEX: &[&str] = &[
    "https://www.moex.com/ru/news/rss",
    "https://www.moex.com/en/news/rss",
    "https://news.google.com/rss/search?q=site:moex.com&hl=ru&gl=RU&ceid=RU:ru",
];
const CBR: &[&str] = &[
    "https://www.cbr.ru/rss/press/",
    "https://www.cbr.ru/eng/rss/press/",
    "https://news.google.com/rss/search?q=site:cbr.ru&hl=ru&gl=RU&ceid=RU:ru",
];
const KOMMERSANT: &[&str] = &[
    "https://www.kommersant.ru/RSS/news.xml",
    "https://news.google.com/rss/search?q=site:kommersant.ru&hl=ru&gl=RU&ceid=RU:ru",
];
const FINMARKET: &[&str] = &[
    "https://www.finmarket.ru/rss/news.xml",
    "https://news.google.com/rss/search?q=site:finmarket.ru&hl=ru&gl=RU&ceid=RU:ru",
];

/// Built-in alternates for well-known sources, keyed by lowercase name
/// (Latin and Cyrillic spellings).
pub fn builtin_mirrors(source_name: &str) -> &'static [&'static str] {
    match source_name.trim().to_lowercase().as_str() {
        "rbc" | "рбк" => RBC,
        "moex" => MOEX,
        "cbr" | "цб рф" => CBR,
        "kommersant" | "коммерсант" => KOMMERSANT,
        "finmarket" | "финмаркет" => FINMARKET,
        _ => &[],
    }
}

/// Ordered fetch candidates: primary, declared mirrors, and built-in mirrors
/// only when none were declared. Duplicates are dropped.
pub fn candidate_urls(source: &Source) -> Vec<String> {
    let mut urls: Vec<String> = Vec::with_capacity(1 + source.mirrors.len());
    let mut push = |u: &str| {
        let u = u.trim();
        if !u.is_empty() && !urls.iter().any(|x| x == u) {
            urls.push(u.to_string());
        }
    };
    push(&source.url);
    for m in &source.mirrors {
        push(m);
    }
    if source.mirrors.is_empty() {
        for m in builtin_mirrors(&source.name) {
            push(m);
        }
    }
    urls
}
