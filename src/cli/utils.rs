use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::Rejection;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a serializable item: pretty JSON, or YAML-ish text for humans
pub fn output_item<T: Serialize>(output_format: &OutputFormat, label: &str, item: &T) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ label: item }))?);
        }
        OutputFormat::Text => {
            print!("{}", serde_yaml::to_string(item)?);
        }
    }
    Ok(())
}

/// Output a list, one summary line per item in text mode
pub fn output_list<T, F>(
    output_format: &OutputFormat,
    collection_name: &str,
    items: &[T],
    empty_message: &str,
    summarize: F,
) -> anyhow::Result<()>
where
    T: Serialize,
    F: Fn(&T) -> String,
{
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: items }))?);
        }
        OutputFormat::Text if items.is_empty() => {
            println!("{}", empty_message);
        }
        OutputFormat::Text => {
            for item in items {
                println!("{}", summarize(item));
            }
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output a rejected operation with the current state of its target
pub fn output_rejection(output_format: &OutputFormat, rejection: &Rejection) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = rejection.to_json();
            response["success"] = json!(false);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Rejected [{}]: {}", rejection.error.error_code(), rejection.error);
            if rejection.error.is_retryable() {
                eprintln!("The target changed or is not yours to act on; re-check its state before retrying.");
            }
            if let Some(current) = &rejection.current {
                eprintln!("Current state:");
                eprint!("{}", serde_yaml::to_string(current)?);
            }
        }
    }
    Ok(())
}

/// `now` shifted by a user-supplied number of days
pub fn days_after(now: DateTime<Utc>, days: i64) -> anyhow::Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|offset| now.checked_add_signed(offset))
        .ok_or_else(|| anyhow!("{} days is out of range", days))
}
