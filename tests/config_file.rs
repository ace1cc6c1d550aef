use std::io::Write;

use bucketfront::config::{CliArgs, LoadError, load};
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tmp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

fn args_for(file: &NamedTempFile) -> CliArgs {
    CliArgs {
        config_file: Some(file.path().to_path_buf()),
        command: None,
    }
}

#[test]
fn loads_routes_and_cache_settings_from_file() {
    let file = config_file(
        r#"
not_found_file = "/srv/www/404.html"

[server]
port = 9090

[origin]
endpoint = "minio.internal:9000"
access_key = "minio"
secret_key = "minio123"

[cache]
url = "redis://127.0.0.1:6379/0"
default_ttl = "10m"

[[routes]]
bucket = "site"

[[routes]]
mount = "/docs"
bucket = "docs"
path_prefix = "/docs"
cache_ttl = "1h"
"#,
    );

    let settings = load(&args_for(&file)).expect("settings should load");

    assert_eq!(settings.server.addr.port(), 9090);
    assert_eq!(settings.origin.endpoint_url(), "http://minio.internal:9000");
    assert_eq!(settings.cache.default_ttl.as_deref(), Some("10m"));
    assert_eq!(
        settings.cache.url.as_deref(),
        Some("redis://127.0.0.1:6379/0")
    );
    assert_eq!(settings.routes.len(), 2);
    assert_eq!(settings.routes[0].mount, "/");
    assert_eq!(settings.routes[1].mount, "/docs");
    assert_eq!(settings.routes[1].cache_ttl.as_deref(), Some("1h"));
    assert_eq!(
        settings.not_found_file.as_deref(),
        Some(std::path::Path::new("/srv/www/404.html"))
    );
}

#[test]
fn file_without_routes_is_rejected() {
    let file = config_file(
        r#"
[origin]
endpoint = "minio.internal:9000"
"#,
    );

    let err = load(&args_for(&file)).expect_err("routes are required");
    assert!(matches!(err, LoadError::Invalid { ref key, .. } if key == "routes"));
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let args = CliArgs {
        config_file: Some("/nonexistent/bucketfront.toml".into()),
        command: None,
    };

    assert!(matches!(load(&args), Err(LoadError::Build(_))));
}
