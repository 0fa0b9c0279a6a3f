use std::env;

/// The Runway API secret, if configured. `.env` loading happens at process
/// start, so a plain env lookup is enough here.
pub fn api_secret() -> Option<String> {
    env::var("RUNWAYML_API_SECRET").ok().filter(|s| !s.is_empty())
}

pub async fn check_ffmpeg() -> bool {
    match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
