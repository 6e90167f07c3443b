//! Session command implementation.

use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use syncline_session::{snapshot, SESSION_SLOT};
use syncline_store::{FileKvStore, KvStore};

/// Session slot report.
///
/// The token itself never reaches the output; the slot is stored masked
/// for the same reason.
#[derive(Debug, Serialize)]
pub struct SessionReport {
    /// Store path.
    pub path: String,
    /// Whether a slot was found.
    pub present: bool,
    /// Decode failure, when the slot bytes are unreadable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Decoded slot contents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionDetails>,
    /// Whether the slot was removed by this invocation.
    pub cleared: bool,
}

/// Decoded contents of the session slot.
#[derive(Debug, Serialize)]
pub struct SessionDetails {
    /// Server-side user ID.
    pub user_id: String,
    /// Display name of the signed-in user.
    pub display_name: String,
    /// Role name as the server reported it.
    pub role: String,
    /// When the stored token was issued.
    pub token_issued_at: String,
    /// When the stored token expires.
    pub token_expires_at: String,
    /// Whether the stored token has passed its expiry.
    pub token_expired: bool,
    /// Last recorded user activity.
    pub last_activity_at: String,
}

/// Runs the session command.
pub fn run(path: &Path, clear: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store directory at {:?}", path).into());
    }

    let kv = FileKvStore::open(path)?;
    let now = Utc::now();

    let mut report = SessionReport {
        path: path.display().to_string(),
        present: false,
        error: None,
        session: None,
        cleared: false,
    };

    if let Some(bytes) = kv.get(SESSION_SLOT)? {
        report.present = true;
        match snapshot::open(&bytes) {
            Ok(session) => {
                report.session = Some(SessionDetails {
                    user_id: session.user.id.clone(),
                    display_name: session.user.display_name.clone(),
                    role: session.user.role.clone(),
                    token_issued_at: session.token_issued_at.to_rfc3339(),
                    token_expires_at: session.token_expires_at.to_rfc3339(),
                    token_expired: !session.is_token_valid(now),
                    last_activity_at: session.last_activity_at.to_rfc3339(),
                });
            }
            Err(e) => {
                report.error = Some(e.to_string());
            }
        }
    }

    if clear && report.present {
        kv.remove(SESSION_SLOT)?;
        report.cleared = true;
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(())
}

fn print_text_output(report: &SessionReport) {
    println!("Session Slot");
    println!("============");
    println!();
    println!("Path: {}", report.path);
    println!();

    if !report.present {
        println!("No session slot present");
        return;
    }

    match &report.session {
        Some(session) => {
            println!(
                "User:          {} ({}, {})",
                session.display_name, session.user_id, session.role
            );
            println!("Token issued:  {}", session.token_issued_at);
            print!("Token expires: {}", session.token_expires_at);
            if session.token_expired {
                print!(" (expired)");
            }
            println!();
            println!("Last activity: {}", session.last_activity_at);
        }
        None => {
            if let Some(ref error) = report.error {
                println!("Session slot is corrupted: {}", error);
                println!("Run with --clear to remove it");
            }
        }
    }

    if report.cleared {
        println!();
        println!("✓ Session slot cleared");
    }
}
