//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Folio Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[presence]
# heartbeat_interval_secs = 300   # 30-3600
# max_visible = 5                 # 1-50

[transport]
# connect_timeout_secs = 15       # 1-120
# liveness_timeout_secs = 60      # 5-600, push feed silence before falling back to polling
# poll_interval_secs = 10         # 1-300
# max_poll_failures = 3           # 1-20, failed polls before going offline
# upgrade_probe_secs = 30         # 5-600

[conversation]
# access_poll_secs = 30           # 5-600
# grace_period_secs = 7           # 1-120

[backend]
# Secrets can also be supplied as FOLIO_API_KEY / FOLIO_ACCESS_TOKEN.
# api_url = "http://localhost:8787/api"
# realtime_url = "ws://localhost:4000/socket/websocket"
# api_key = ""
# access_token = ""

[logging]
# level = "info"                  # trace, debug, info, warn, error
"##
    .to_string()
}
