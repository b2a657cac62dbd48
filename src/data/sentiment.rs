use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error};
use crate::config::{SentimentConfig, SourcesConfig};
use crate::data::types::{SentimentScore, TickerSymbol};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; SignalFusion/1.0)";

/// Sentiment collaborator. Never fails: no mentions or no feed is neutral.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_sentiment(&self, ticker: &TickerSymbol) -> SentimentScore;
}

#[derive(Debug, Clone, Default)]
pub struct FallbackSentimentSource;

#[async_trait]
impl SentimentSource for FallbackSentimentSource {
    fn name(&self) -> &'static str {
        "fallback-sentiment"
    }

    async fn fetch_sentiment(&self, ticker: &TickerSymbol) -> SentimentScore {
        debug!("Sentiment source disabled; neutral sentiment for {}", ticker);
        SentimentScore::NEUTRAL
    }
}

/// Bullish/bearish keyword tally over free text.
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    bullish: HashSet<String>,
    bearish: HashSet<String>,
    splitter: Regex,
}

/// Raw keyword hits behind a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordTally {
    pub bullish: usize,
    pub bearish: usize,
}

impl KeywordTally {
    pub fn total(&self) -> usize {
        self.bullish + self.bearish
    }

    pub fn score(&self) -> SentimentScore {
        SentimentScore::from_tally(self.bullish, self.bearish)
    }
}

impl KeywordScorer {
    pub fn new(config: &SentimentConfig) -> Result<Self> {
        let normalise = |words: &[String]| -> HashSet<String> {
            words.iter().map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()).collect()
        };

        Ok(Self {
            bullish: normalise(config.bullish_keywords.as_slice()),
            bearish: normalise(config.bearish_keywords.as_slice()),
            splitter: Regex::new(r"[^a-z0-9$]+")?,
        })
    }

    pub fn tally<'a, I>(&self, texts: I) -> KeywordTally
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tally = KeywordTally::default();

        for text in texts {
            let lowered = text.to_lowercase();
            for token in self.splitter.split(&lowered).filter(|t| !t.is_empty()) {
                if self.bullish.contains(token) {
                    tally.bullish += 1;
                }
                if self.bearish.contains(token) {
                    tally.bearish += 1;
                }
            }
        }

        tally
    }
}

#[derive(Debug, Deserialize)]
struct RedditListing {
    #[serde(default)]
    data: RedditListingData,
}

#[derive(Debug, Default, Deserialize)]
struct RedditListingData {
    #[serde(default)]
    children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
struct RedditChild {
    #[serde(default)]
    data: RedditPost,
}

#[derive(Debug, Default, Deserialize)]
struct RedditPost {
    #[serde(default)]
    title: Option<String>,
}

pub struct RedditSentimentClient {
    client: Client,
    search_url: String,
    limit: usize,
    scorer: KeywordScorer,
}

impl RedditSentimentClient {
    pub fn new(sources: &SourcesConfig, sentiment: &SentimentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(sources.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build Reddit HTTP client")?;

        Ok(Self {
            client,
            search_url: sources.reddit_search_url.clone(),
            limit: sources.post_limit,
            scorer: KeywordScorer::new(sentiment)?,
        })
    }

    /// Fetch recent post titles mentioning `$TICKER`
    async fn fetch_recent_posts(&self, ticker: &TickerSymbol) -> Result<Vec<String>> {
        let query = format!("${}", ticker);
        let limit = self.limit.to_string();

        let listing: RedditListing = self.client
            .get(&self.search_url)
            .query(&[
                ("q", query.as_str()),
                ("restrict_sr", "on"),
                ("sort", "new"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch Reddit posts")?
            .error_for_status()
            .context("Reddit search rejected")?
            .json()
            .await
            .context("Failed to parse Reddit response")?;

        Ok(post_titles(listing))
    }
}

fn post_titles(listing: RedditListing) -> Vec<String> {
    listing.data.children
        .into_iter()
        .filter_map(|child| child.data.title)
        .collect()
}

#[async_trait]
impl SentimentSource for RedditSentimentClient {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn fetch_sentiment(&self, ticker: &TickerSymbol) -> SentimentScore {
        let posts = match self.fetch_recent_posts(ticker).await {
            Ok(posts) => posts,
            Err(e) => {
                error!("Failed to fetch Reddit posts for {}: {:#}", ticker, e);
                return SentimentScore::NEUTRAL;
            }
        };

        let tally = self.scorer.tally(posts.iter().map(String::as_str));
        debug!(
            "{}: {} posts, {} keyword hits ({} bullish / {} bearish)",
            ticker,
            posts.len(),
            tally.total(),
            tally.bullish,
            tally.bearish
        );

        tally.score()
    }
}
