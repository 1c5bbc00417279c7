//! Logging setup with secret redaction
//!
//! Every line written by the `tracing` subscriber passes through
//! [`RedactionPatterns`] so bot tokens and API keys never reach stderr.

use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
pub struct RedactionPatterns {
    token_in_url: Regex,
    bare_token: Regex,
    api_key_header: Regex,
    secrets: Vec<Regex>,
}

impl RedactionPatterns {
    /// Initialize all regex patterns; `secrets` are masked verbatim wherever they appear.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    pub fn new(secrets: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            token_in_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)")?,
            bare_token: Regex::new(r"\b[0-9]{8,10}:[A-Za-z0-9_-]{35}\b")?,
            api_key_header: Regex::new(r"(?i)(x-api-key[\x22']?\s*[:=]\s*[\x22']?)[^\s\x22',}]+")?,
            secrets: secrets
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| Regex::new(&regex::escape(s)))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Returns `input` with every known secret masked
    #[must_use]
    pub fn redact(&self, input: &str) -> String {
        let mut output = self
            .token_in_url
            .replace_all(input, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .bare_token
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .api_key_header
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        for secret in &self.secrets {
            output = secret.replace_all(&output, "[MASKED]").to_string();
        }
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may be shorter or longer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), redacted stderr output.
pub fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsawq";

    #[test]
    fn test_telegram_token_in_url_is_masked() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new(&[])?;
        let line = format!("error sending request for url (https://api.telegram.org/bot{TOKEN}/getMe)");

        let redacted = patterns.redact(&line);
        assert!(!redacted.contains(TOKEN));
        assert!(redacted.contains("https://api.telegram.org/bot[TELEGRAM_TOKEN]/getMe"));
        Ok(())
    }

    #[test]
    fn test_bare_token_is_masked() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new(&[])?;
        let redacted = patterns.redact(&format!("token={TOKEN} loaded"));
        assert_eq!(redacted, "token=[TELEGRAM_TOKEN] loaded");
        Ok(())
    }

    #[test]
    fn test_api_key_header_and_known_secret_are_masked() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new(&["s3cr3t+key", ""])?;

        let redacted = patterns.redact(r#"headers: {"x-api-key": "abcdef"}"#);
        assert_eq!(redacted, r#"headers: {"x-api-key": "[MASKED]"}"#);

        let redacted = patterns.redact("api_key=s3cr3t+key");
        assert_eq!(redacted, "api_key=[MASKED]");
        Ok(())
    }

    #[test]
    fn test_plain_text_untouched() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new(&[])?;
        let line = "Lookup for user 42 via ip-api succeeded.";
        assert_eq!(patterns.redact(line), line);
        Ok(())
    }
}
