use std::path::Path;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_CONTENT_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("the website took too long to respond, please try again")]
    Timeout,
    #[error("unable to reach the website; check the URL and your internet connection")]
    Connection,
    #[error("access forbidden: the website is blocking automated access")]
    Forbidden,
    #[error("page not found; check the URL")]
    NotFound,
    #[error("the website server is experiencing issues, please try again later")]
    ServerError(u16),
    #[error("HTTP error {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("unable to extract sufficient content; the site may be empty or blocking automated access")]
    NoContent,
    #[error("failed to read '{path}': {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
}

/// Fetches a page and reduces it to plain text: markup, scripts, styles and
/// navigation boilerplate stripped, whitespace collapsed.
pub fn fetch_page_text(url: &str) -> Result<String, ScrapeError> {
    tracing::info!(url, "fetching page");

    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ScrapeError::Network(e.to_string()))?;

    let response = client.get(url).send().map_err(classify_request_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(match status.as_u16() {
            403 => ScrapeError::Forbidden,
            404 => ScrapeError::NotFound,
            code if code >= 500 => ScrapeError::ServerError(code),
            code => ScrapeError::Http(code),
        });
    }

    let html = response
        .text()
        .map_err(|e| ScrapeError::Network(e.to_string()))?;

    let text = html_to_text(&html);
    if text.chars().count() < MIN_CONTENT_LEN {
        return Err(ScrapeError::NoContent);
    }

    tracing::info!(chars = text.chars().count(), "page text extracted");
    Ok(text)
}

/// Reads a local plain-text source, with the same minimum-content rule as
/// fetched pages.
pub fn read_text_file(path: impl AsRef<Path>) -> Result<String, ScrapeError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ScrapeError::File {
        path: path.display().to_string(),
        source,
    })?;

    let text = collapse_whitespace(&raw);
    if text.chars().count() < MIN_CONTENT_LEN {
        return Err(ScrapeError::NoContent);
    }
    Ok(text)
}

fn classify_request_error(e: reqwest::Error) -> ScrapeError {
    if e.is_timeout() {
        ScrapeError::Timeout
    } else if e.is_connect() {
        ScrapeError::Connection
    } else {
        ScrapeError::Network(e.to_string())
    }
}

/// Strips an HTML document down to its visible text. Script, style, nav and
/// footer subtrees are dropped wholesale, remaining tags removed, common
/// entities decoded, whitespace collapsed to single spaces.
pub fn html_to_text(html: &str) -> String {
    lazy_static! {
        // One pattern per element so an opening tag is only ever paired
        // with its own closing tag.
        static ref DROP_BLOCKS: Vec<Regex> = ["script", "style", "nav", "footer"]
            .iter()
            .map(|tag| {
                Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap()
            })
            .collect();
        // Raw-text elements left unclosed would otherwise leak their body
        // into the output; drop them through to the end of the document.
        static ref UNCLOSED_RAW: Regex =
            Regex::new(r"(?is)<(script|style)\b[^>]*>.*$").unwrap();
        static ref COMMENTS: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
        static ref TAGS: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
    }

    let mut text = html.to_string();
    for pattern in DROP_BLOCKS.iter() {
        text = pattern.replace_all(&text, " ").into_owned();
    }
    let text = UNCLOSED_RAW.replace_all(&text, " ");
    let text = COMMENTS.replace_all(&text, " ");
    let text = TAGS.replace_all(&text, " ");
    let text = decode_entities(&text);
    collapse_whitespace(&text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
