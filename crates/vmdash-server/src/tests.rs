use std::collections::HashMap;

use crate::api::pagination::PaginationParams;
use crate::api::to_custom_error_code;
use crate::auth::{create_token, generate_secret, validate_token};
use crate::config::{RulesSeedFile, ServerConfig};
use crate::engine::influx::{builtin_flux, parse_annotated_csv, render_query_template};
use crate::logging::{format_elapsed, generate_trace_id, truncate_body};
use vmdash_common::types::{AlertCategory, Severity};

#[test]
fn config_defaults_fill_missing_sections() {
    let config: ServerConfig = toml::from_str("http_port = 9000").expect("config should parse");
    assert_eq!(config.http_port, 9000);
    assert_eq!(config.database.url, "sqlite://data/vmdash.db?mode=rwc");
    assert_eq!(config.auth.audience.as_deref(), Some("authenticated"));
    assert!(config.engine.enabled);
    assert_eq!(config.engine.reload_interval_secs, 300);
    assert!(config.engine.auto_resolve_from_acknowledged);
    assert_eq!(config.engine.dedup_policy, "refresh_open");
    assert_eq!(config.influx.bucket, "proxmox_metrics");
    assert!(!config.notification.enabled);
    assert_eq!(config.notification.min_severity, Severity::High);
    assert_eq!(config.feed.channel_capacity, 256);
}

#[test]
fn config_parses_recipients_and_policy() {
    let raw = r#"
        [engine]
        dedup_policy = "always_insert"
        auto_resolve_from_acknowledged = false

        [notification]
        enabled = true
        webhook_url = "https://example.com/functions/v1/send-alert-email"
        min_severity = "medium"
        recipients = [{ email = "ops@example.com", name = "Ops" }]
    "#;
    let config: ServerConfig = toml::from_str(raw).expect("config should parse");
    assert_eq!(config.engine.dedup_policy, "always_insert");
    assert!(!config.engine.auto_resolve_from_acknowledged);
    assert_eq!(config.notification.min_severity, Severity::Medium);
    assert_eq!(config.notification.recipients.len(), 1);
    assert_eq!(config.notification.recipients[0].email, "ops@example.com");
}

#[test]
fn env_overrides_replace_secrets_but_skip_empty() {
    let mut config = ServerConfig::default();
    config.influx.token = Some("from-file".to_string());
    let env: HashMap<&str, &str> = [
        ("VMDASH_JWT_SECRET", "jwt-from-env"),
        ("VMDASH_INFLUX_TOKEN", ""),
        ("VMDASH_NOTIFY_SERVICE_KEY", "svc"),
    ]
    .into_iter()
    .collect();

    config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));
    assert_eq!(config.auth.jwt_secret.as_deref(), Some("jwt-from-env"));
    assert_eq!(config.influx.token.as_deref(), Some("from-file"));
    assert_eq!(config.notification.service_key.as_deref(), Some("svc"));
}

#[test]
fn seed_file_applies_rule_defaults() {
    let raw = r#"{"rules":[{"name":"Disk","metric_type":"storage_usage","threshold_value":85}]}"#;
    let seed: RulesSeedFile = serde_json::from_str(raw).expect("seed should parse");
    let rule = seed.rules[0].to_rule("1".to_string());
    assert_eq!(rule.category, AlertCategory::NodeHealth);
    assert_eq!(rule.severity, Severity::Medium);
    assert_eq!(rule.condition_operator, ">");
    assert_eq!(rule.check_interval_seconds, 60);
    assert_eq!(rule.cooldown_seconds, 300);
    assert!(rule.enabled);
}

#[test]
fn error_codes_map_to_envelope_numbers() {
    assert_eq!(to_custom_error_code("bad_request"), 1001);
    assert_eq!(to_custom_error_code("unauthorized"), 1002);
    assert_eq!(to_custom_error_code("token_expired"), 1003);
    assert_eq!(to_custom_error_code("not_found"), 1004);
    assert_eq!(to_custom_error_code("invalid_transition"), 1005);
    assert_eq!(to_custom_error_code("transient_io"), 1503);
    assert_eq!(to_custom_error_code("something_else"), 1999);
}

#[test]
fn pagination_limit_is_clamped() {
    assert_eq!(PaginationParams::resolve_limit(None), 50);
    assert_eq!(PaginationParams::resolve_limit(Some(0)), 1);
    assert_eq!(PaginationParams::resolve_limit(Some(1000)), 200);
    assert_eq!(PaginationParams::resolve_offset(None), 0);
}

#[test]
fn token_round_trip_checks_audience() {
    let token = create_token("s3cret", "user-9", Some("a@b.c"), Some("authenticated"), 60)
        .expect("token should sign");
    let claims = validate_token("s3cret", Some("authenticated"), &token).expect("valid");
    assert_eq!(claims.sub, "user-9");
    assert_eq!(claims.session().email.as_deref(), Some("a@b.c"));

    assert!(validate_token("s3cret", Some("service_role"), &token).is_err());
    assert!(validate_token("other", Some("authenticated"), &token).is_err());
    assert!(validate_token("s3cret", None, &token).is_ok());
}

#[test]
fn generated_secret_is_alphanumeric() {
    let secret = generate_secret();
    assert_eq!(secret.len(), 48);
    assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(secret, generate_secret());
}

#[test]
fn trace_id_is_sixteen_hex_chars() {
    let id = generate_trace_id();
    assert_eq!(id.len(), 16);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn truncate_body_respects_char_boundaries() {
    assert_eq!(truncate_body(b"short", 10), "short");
    assert_eq!(truncate_body("告警告警".as_bytes(), 4), "告...");
    assert_eq!(truncate_body(&[0xff, 0xfe], 10), "<non-utf8 body>");
}

#[test]
fn elapsed_is_formatted_by_magnitude() {
    assert_eq!(format_elapsed(500), "500µs");
    assert_eq!(format_elapsed(12_345), "12ms");
    assert_eq!(format_elapsed(2_500_000), "2.5s");
}

#[test]
fn annotated_csv_rows_are_keyed_by_header() {
    let body = "#datatype,string,long,double,string\r\n\
                #group,false,false,false,true\r\n\
                #default,_result,,,\r\n\
                ,result,table,_value,host\r\n\
                ,,0,93.5,pve-1\r\n\
                ,,1,12.25,pve-2\r\n\
                \r\n\
                ,result,table,_value,host\r\n\
                ,,0,7,\"pve,3\"\r\n";
    let rows = parse_annotated_csv(body);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["host"], "pve-1");
    assert_eq!(rows[0]["_value"], "93.5");
    assert_eq!(rows[1]["table"], "1");
    assert_eq!(rows[2]["host"], "pve,3");
    assert!(!rows[0].contains_key(""));
}

#[test]
fn builtin_queries_group_by_host() {
    let cpu = builtin_flux("cpu_usage", "proxmox_metrics", "5m").expect("cpu query");
    assert!(cpu.contains("from(bucket: \"proxmox_metrics\")"));
    assert!(cpu.contains("range(start: -5m)"));
    assert!(cpu.contains("r._measurement == \"cpustat\""));
    assert!(cpu.contains("group(columns: [\"host\"])"));
    assert!(cpu.contains("* 100.0"));

    let mem = builtin_flux("memory_usage", "b", "5m").expect("memory query");
    assert!(mem.contains("memused") && mem.contains("memtotal") && mem.contains("join("));

    let disk = builtin_flux("storage_usage", "b", "5m").expect("storage query");
    assert!(disk.contains("blockstat"));

    assert!(builtin_flux("vm_count", "b", "5m").is_none());
}

#[test]
fn custom_query_placeholders_are_substituted() {
    let q = render_query_template(
        "from(bucket: \"${INFLUXDB_BUCKET}\") |> filter(fn: (r) => r.host == \"${node_name}\")",
        "pve-1",
        "metrics",
    );
    assert_eq!(
        q,
        "from(bucket: \"metrics\") |> filter(fn: (r) => r.host == \"pve-1\")"
    );
}
