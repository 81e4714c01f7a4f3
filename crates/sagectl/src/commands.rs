//! Command execution

use anyhow::{Context, Result};
use sage_common::{PathUpdate, PuzzleSubmission};
use serde::Serialize;

use crate::cli::{Cli, Commands};
use crate::client::SageClient;
use crate::output;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print either raw JSON or the rendered form
fn emit<T: Serialize>(json: bool, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        print_json(value)
    } else {
        print!("{}", render(value));
        Ok(())
    }
}

pub fn path_update(completed: bool, time_spent: Option<f64>, score: Option<u32>) -> PathUpdate {
    let update = if completed {
        PathUpdate::completion(score)
    } else {
        PathUpdate::touch()
    };
    match time_spent {
        Some(minutes) => update.with_time_spent(minutes),
        None => update,
    }
}

pub fn parse_answers(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).with_context(|| format!("--answers is not valid JSON: {}", raw))
}

pub async fn run(cli: Cli) -> Result<()> {
    let client = SageClient::new(&cli.url, cli.user.clone())?;
    let json = cli.json;

    match cli.command {
        Commands::Status => {
            let health = client.health().await?;
            if !client.has_user() {
                return emit(json, &health, output::render_health);
            }
            let ledger = client.user_progress().await?;
            if json {
                return print_json(&serde_json::json!({ "health": health, "progress": ledger }));
            }
            print!("{}", output::render_health(&health));
            println!();
            print!("{}", output::render_ledger(&ledger));
            Ok(())
        }
        Commands::Topics {
            category,
            difficulty,
        } => {
            let topics = client
                .topics(category.as_deref(), difficulty.as_deref())
                .await?;
            emit(json, &topics, |t| output::render_topics(t))
        }
        Commands::Progress { topic: Some(topic) } => {
            let progress = client.topic_progress(&topic).await?;
            emit(json, &progress, output::render_topic_progress)
        }
        Commands::Progress { topic: None } => {
            let ledger = client.user_progress().await?;
            emit(json, &ledger, output::render_ledger)
        }
        Commands::Complete {
            topic,
            path,
            time_spent,
            score,
        } => {
            let update = path_update(true, time_spent, score);
            let result = client.update_path(&topic, &path, &update).await?;
            emit(json, &result, output::render_update)
        }
        Commands::Visit {
            topic,
            path,
            time_spent,
        } => {
            let update = path_update(false, time_spent, None);
            let result = client.update_path(&topic, &path, &update).await?;
            emit(json, &result, output::render_update)
        }
        Commands::Submit {
            topic,
            path,
            answers,
            time_taken,
        } => {
            let submission = PuzzleSubmission {
                answers: parse_answers(&answers)?,
                time_taken,
            };
            let result = client.submit(&topic, &path, &submission).await?;
            emit(json, &result, output::render_submission)
        }
        Commands::Leaderboard { limit, timeframe } => {
            let entries = client.leaderboard(limit, timeframe).await?;
            emit(json, &entries, |e| output::render_leaderboard(e))
        }
        Commands::History { limit } => {
            let mut attempts = client.history().await?;
            if json {
                if let Some(limit) = limit {
                    attempts.truncate(limit);
                }
                return print_json(&attempts);
            }
            print!("{}", output::render_history(&attempts, limit));
            Ok(())
        }
    }
}
