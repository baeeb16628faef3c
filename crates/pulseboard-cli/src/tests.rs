use super::*;

fn d(s: &str) -> NaiveDate {
    s.parse().expect("valid date")
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["pulseboard-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["pulseboard-cli", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn parses_oauth_url_with_platform_key() {
    let org = Uuid::new_v4().to_string();
    let cli = Cli::try_parse_from([
        "pulseboard-cli",
        "oauth-url",
        "--platform",
        "google_analytics",
        "--organization",
        &org,
    ])
    .expect("expected valid cli args");

    match cli.command {
        Some(Commands::OauthUrl {
            platform,
            organization,
        }) => {
            assert_eq!(platform, PlatformType::GoogleAnalytics);
            assert_eq!(organization.to_string(), org);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn oauth_url_rejects_unsupported_platform() {
    let org = Uuid::new_v4().to_string();
    let result = Cli::try_parse_from([
        "pulseboard-cli",
        "oauth-url",
        "--platform",
        "twitter",
        "--organization",
        &org,
    ]);
    assert!(result.is_err());
}

#[test]
fn sync_dates_are_optional() {
    let stream = Uuid::new_v4().to_string();
    let cli = Cli::try_parse_from(["pulseboard-cli", "sync", "--stream", &stream])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            start: None,
            end: None,
            ..
        })
    ));
}

#[test]
fn sync_parses_explicit_dates() {
    let stream = Uuid::new_v4().to_string();
    let cli = Cli::try_parse_from([
        "pulseboard-cli",
        "sync",
        "--stream",
        &stream,
        "--start",
        "2025-03-01",
        "--end",
        "2025-03-07",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Sync { start, end, .. }) => {
            assert_eq!(start, Some(d("2025-03-01")));
            assert_eq!(end, Some(d("2025-03-07")));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn sync_requires_a_valid_stream_id() {
    assert!(Cli::try_parse_from(["pulseboard-cli", "sync", "--stream", "not-a-uuid"]).is_err());
    assert!(Cli::try_parse_from(["pulseboard-cli", "sync"]).is_err());
}

#[test]
fn range_defaults_to_yesterday() {
    let (start, end) = streams::resolve_range(None, None, d("2025-03-10")).expect("valid range");
    assert_eq!(start, d("2025-03-09"));
    assert_eq!(end, d("2025-03-09"));
}

#[test]
fn range_start_defaults_to_end() {
    let (start, end) =
        streams::resolve_range(None, Some(d("2025-02-01")), d("2025-03-10")).expect("valid range");
    assert_eq!(start, d("2025-02-01"));
    assert_eq!(end, d("2025-02-01"));
}

#[test]
fn range_rejects_start_after_end() {
    assert!(streams::resolve_range(Some(d("2025-03-10")), None, d("2025-03-10")).is_err());
}

#[test]
fn range_accepts_a_full_leap_year() {
    let (start, end) =
        streams::resolve_range(Some(d("2024-01-01")), Some(d("2024-12-31")), d("2025-03-10"))
            .expect("366 days is allowed");
    assert_eq!((end - start).num_days(), 365);
}

#[test]
fn range_rejects_more_than_the_cap() {
    assert!(
        streams::resolve_range(Some(d("2024-01-01")), Some(d("2025-01-01")), d("2025-03-10"))
            .is_err()
    );
}
