use pock_core::auth::{AuthSession, UserIdentity};
use pock_core::db::ProfileRepository;

use crate::cli::AuthCommands;
use crate::commands::common::{format_timestamp, CliContext};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, ctx: &CliContext) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            id,
            name,
            email,
            photo_url,
            token,
            expires_in,
        } => {
            let user = UserIdentity::new(id, name, email, photo_url)?;
            let session = AuthSession {
                user,
                id_token: token,
                expires_at: expires_in.map(|seconds| chrono::Utc::now().timestamp() + seconds),
            };

            let manager = ctx.sessions()?;
            let session = manager.sign_in(session)?;

            let db = ctx.database().await?;
            ProfileRepository::new(db.connection())
                .initialize(&session.user.id)
                .await?;

            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!(
                "Signed in profile '{}' as {} <{}>",
                ctx.profile_name, session.user.name, email_label
            );
            Ok(())
        }
        AuthCommands::Status => {
            let Some(session) = ctx.sessions()?.current() else {
                println!("Profile '{}' is not signed in.", ctx.profile_name);
                return Ok(());
            };

            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            let expiry = session.expires_at.map_or_else(
                || "never".to_string(),
                |seconds| format_timestamp(seconds.saturating_mul(1000)),
            );
            println!(
                "Profile '{}' is signed in as {} <{}> (id={}, expires={})",
                ctx.profile_name, session.user.name, email_label, session.user.id, expiry
            );

            let db = ctx.database().await?;
            if let Some(goals) = ProfileRepository::new(db.connection())
                .goals(&session.user.id)
                .await?
            {
                println!(
                    "Goals: {} min/day, {} min/week, {} pages/day, {} books/month",
                    goals.daily, goals.weekly, goals.pages_per_day, goals.books_per_month
                );
            }
            Ok(())
        }
        AuthCommands::Logout => {
            ctx.sessions()?.sign_out()?;
            println!("Signed out profile '{}'", ctx.profile_name);
            Ok(())
        }
    }
}
