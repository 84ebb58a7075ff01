//! Print the effective configuration.

use anyhow::Result;
use roomsync_client::ProviderConfig;
use std::path::Path;

/// Run the config command.
pub fn run(path: Option<&Path>) -> Result<()> {
    let config = crate::config::load(path)?;
    print!("{}", render(&config));
    Ok(())
}

fn render(config: &ProviderConfig) -> String {
    let unset = || "(none)".to_string();
    let mut out = String::new();
    out.push_str("=== roomsync config ===\n\n");
    out.push_str("Room:\n");
    out.push_str(&format!("  ID:        {}\n", config.room_id));
    out.push_str(&format!("  Name:      {}\n", config.display_name));
    out.push_str(&format!(
        "  Color:     {}\n",
        config.color_tag.clone().unwrap_or_else(|| "(derived)".into())
    ));
    out.push_str(&format!(
        "  Endpoint:  {}\n",
        config.endpoint.clone().unwrap_or_else(unset)
    ));
    out.push_str(&format!(
        "  API key:   {}\n",
        if config.api_key.is_some() { "set" } else { "(none)" }
    ));
    out.push_str("\nTuning:\n");
    out.push_str(&format!("  Flush interval:   {:?}\n", config.flush_interval));
    out.push_str(&format!("  Max batch:        {}\n", config.max_batch));
    out.push_str(&format!("  Dedup window:     {:?}\n", config.dedup_window));
    out.push_str(&format!("  Max offer jitter: {:?}\n", config.max_offer_jitter));
    out.push_str(&format!("  Reconcile every:  {:?}\n", config.reconcile_interval));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn api_key_is_never_printed() {
        let config = ProviderConfig::new("room").with_endpoint("wss://rt", Some("s3cret"));
        let text = render(&config);

        assert!(text.contains("wss://rt"));
        assert!(text.contains("API key:   set"));
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn shows_defaults() {
        let text = render(&ProviderConfig::new("room"));
        assert!(text.contains("Max batch:        100"));
        assert!(text.contains("Reconcile every:  2s"));
        assert!(text.contains("Color:     (derived)"));
    }

    #[test]
    fn run_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roomsync.toml");
        std::fs::write(&path, "[room]\nid = \"city-9\"\n").unwrap();

        assert!(run(Some(&path)).is_ok());
        assert!(run(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
