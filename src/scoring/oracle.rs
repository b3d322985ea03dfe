//! External scoring oracle: the `claude` CLI scored as a subprocess.
//!
//! Everything that can go wrong out there (missing binary, timeout,
//! nonzero exit, prose-wrapped or malformed JSON) degrades to a zero
//! count with a log line. The cycle carries on and retries next time.

use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{InterestProfile, ScoreItem};
use crate::scoring::prepare_batch;

pub const SCORING_TIMEOUT_SECS: u64 = 180;
const SCORING_COMMAND: &str = "claude";

/// Score unscored articles through the oracle. Returns the count of
/// scores written; transient oracle failures yield Ok(0).
pub async fn score_unscored(
    repo: &Repository,
    interests: &InterestProfile,
    limit: usize,
) -> Result<usize> {
    let Some(batch) = prepare_batch(repo, interests, limit).await? else {
        return Ok(0);
    };

    let prompt = format!(
        "You are scoring articles for a personalized RSS reader. \
         Given the user interests and articles below, score each article.\n\n\
         {batch}\n\n\
         Return ONLY a valid JSON array. No markdown fences, no extra text. \
         Each element: {{\"article_id\": <id>, \"relevance\": <0-10>, \
         \"significance\": <0-10>, \"confidence\": <0.0-1.0>, \
         \"summary\": \"<1-2 sentences>\", \
         \"topics\": [\"tag1\"], \"reason\": \"<why>\"}}"
    );

    let Some(output) = invoke_oracle(
        SCORING_COMMAND,
        &["-p"],
        &prompt,
        Duration::from_secs(SCORING_TIMEOUT_SECS),
    )
    .await?
    else {
        return Ok(0);
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!(
            "Scoring failed (exit {:?}): {}",
            output.status.code(),
            stderr.chars().take(500).collect::<String>()
        );
        return Ok(0);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(json) = extract_json_array(&stdout) else {
        tracing::error!("No JSON array in scoring response, skipped");
        return Ok(0);
    };

    let items = match parse_score_items(json) {
        Ok(items) => items,
        Err(e) => {
            tracing::error!("Malformed scoring response: {}", e);
            return Ok(0);
        }
    };

    repo.upsert_scores(items, Utc::now()).await
}

/// Spawn the oracle, feed it the prompt on stdin, and collect its
/// output. Degraded outcomes (missing binary, timeout, subprocess I/O
/// failure) log and return None.
async fn invoke_oracle(
    command: &str,
    args: &[&str],
    prompt: &str,
    timeout: Duration,
) -> Result<Option<std::process::Output>> {
    let mut child = match Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!("'{}' not found in PATH, scoring skipped", command);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    // The child may not drain stdin until it is ready to respond, so
    // the write has to sit under the same deadline as the wait: a
    // prompt larger than the pipe buffer would otherwise block forever
    // against a stalled reader.
    let run = async {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            // Dropping stdin closes the pipe and lets the child finish.
        }
        child.wait_with_output().await
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => Ok(Some(output)),
        Ok(Err(e)) => {
            tracing::error!("Scoring subprocess failed: {}", e);
            Ok(None)
        }
        Err(_) => {
            tracing::error!(
                "Scoring timed out ({}s), skipped until next cycle",
                timeout.as_secs()
            );
            Ok(None)
        }
    }
}

/// Pull the JSON array out of possibly prose-wrapped oracle output via
/// a first-`[` / last-`]` bracket scan.
pub fn extract_json_array(output: &str) -> Option<&str> {
    let start = output.find('[')?;
    let end = output.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&output[start..=end])
}

/// Parse a JSON array of score items leniently: elements that fail to
/// parse (or lack an article id) are skipped, not fatal. A payload
/// that is not an array at all is an error.
pub fn parse_score_items(json: &str) -> Result<Vec<ScoreItem>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| AppError::Scoring(format!("expected a JSON array of score objects: {e}")))?;

    Ok(values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<ScoreItem>(v).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_scan_strips_wrapping_prose() {
        let output = "Sure, here are the scores:\n[{\"article_id\": 1}]\nHope that helps!";
        assert_eq!(extract_json_array(output), Some("[{\"article_id\": 1}]"));
    }

    #[test]
    fn bracket_scan_rejects_missing_or_reversed_brackets() {
        assert_eq!(extract_json_array("no json here"), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn parse_accepts_id_alias_and_defaults() {
        let items = parse_score_items(r#"[{"id": 3, "relevance": 7}]"#).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].article_id, 3);
        assert_eq!(items[0].relevance, 7.0);
        assert_eq!(items[0].significance, 0.0);
        assert_eq!(items[0].confidence, 1.0);
        assert!(items[0].topics.is_empty());
    }

    #[test]
    fn parse_skips_malformed_elements() {
        let items = parse_score_items(
            r#"[{"article_id": 1, "relevance": 5}, {"no_id": true}, {"article_id": 2}]"#,
        )
        .unwrap();
        let ids: Vec<i64> = items.iter().map(|i| i.article_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn parse_rejects_non_array_payload() {
        assert!(parse_score_items(r#"{"article_id": 1}"#).is_err());
        assert!(parse_score_items("not json").is_err());
    }

    #[tokio::test]
    async fn timeout_covers_the_stdin_write() {
        // A child that never reads stdin, with a prompt well past the
        // 64 KiB pipe buffer: the write blocks, so the deadline has to
        // cover it or the call never returns.
        let prompt = "x".repeat(256 * 1024);
        let start = std::time::Instant::now();
        let output = invoke_oracle("sleep", &["5"], &prompt, Duration::from_millis(200))
            .await
            .unwrap();
        assert!(output.is_none());
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn missing_binary_degrades_to_none() {
        let output = invoke_oracle(
            "feedrank-no-such-binary",
            &["-p"],
            "hello",
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert!(output.is_none());
    }
}
