//! Payload delivery on a booted instance.
//!
//! Fire-and-continue: every step runs regardless of how the previous one
//! reported. adb exit codes say nothing reliable about in-guest success.

use crate::application::ports::{Clock, CommandChannel, CommandOutput};
use crate::domain::config::PayloadConfig;
use crate::domain::link;

/// What was sent to one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadReport {
    pub link: String,
    /// Install output, kept for diagnostics only.
    pub install: Option<CommandOutput>,
}

pub fn view_link_args(url: &str) -> [&str; 7] {
    [
        "shell",
        "am",
        "start",
        "-a",
        "android.intent.action.VIEW",
        "-d",
        url,
    ]
}

pub fn launch_args(package: &str) -> [&str; 7] {
    [
        "shell",
        "monkey",
        "-p",
        package,
        "-c",
        "android.intent.category.LAUNCHER",
        "1",
    ]
}

/// Open the link, install the artifact, launch the app and keep it open.
pub async fn deliver(
    channel: &impl CommandChannel,
    clock: &impl Clock,
    endpoint: &str,
    payload: &PayloadConfig,
    user_id: u32,
) -> PayloadReport {
    let url = link::render(&payload.link_template, user_id);
    tracing::info!(endpoint, link = %url, "opening link");
    if let Err(e) = channel.fire_and_forget(endpoint, &view_link_args(&url)).await {
        tracing::warn!(endpoint, error = %e, "view intent not delivered");
    }
    clock.sleep(payload.link_settle()).await;

    let artifact = payload.artifact.to_string_lossy();
    tracing::info!(endpoint, artifact = %artifact, "installing");
    let install = match channel
        .execute(
            endpoint,
            &["install", "-r", &artifact],
            Some(payload.install_timeout()),
        )
        .await
    {
        Ok(out) => {
            tracing::debug!(
                endpoint,
                exit_code = ?out.exit_code,
                stdout = out.stdout.trim(),
                stderr = out.stderr.trim(),
                "install finished"
            );
            Some(out)
        }
        Err(e) => {
            tracing::warn!(endpoint, error = %e, "install command failed");
            None
        }
    };
    clock.sleep(payload.install_settle()).await;

    tracing::info!(endpoint, package = %payload.package, "launching app");
    if let Err(e) = channel
        .fire_and_forget(endpoint, &launch_args(&payload.package))
        .await
    {
        tracing::warn!(endpoint, error = %e, "launch intent not delivered");
    }
    clock.sleep(payload.run_time()).await;

    PayloadReport { link: url, install }
}
