#![allow(clippy::unwrap_used)]

use std::io::Write;

use courier::config;
use courier_credentials::SourceConfig;
use pretty_assertions::assert_eq;

#[test]
fn explicit_path_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"(
            listen: "127.0.0.1:2525",
            banner: "relay.example.com",
            credentials: (
                source: Vault(path: "aws/creds/mail"),
                vault: (address: "http://127.0.0.1:8200", token: Some("s.token")),
            ),
        )"#
    )
    .unwrap();

    let courier = config::load(Some(file.path())).unwrap();

    assert_eq!(courier.listen, "127.0.0.1:2525");
    assert_eq!(
        courier.credentials.source,
        SourceConfig::Vault {
            path: "aws/creds/mail".to_string()
        }
    );
    assert_eq!(courier.session_config().banner.as_ref(), "relay.example.com");
}

#[test]
fn invalid_file_names_the_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "(listen: 2525)").unwrap();

    let err = config::load(Some(file.path())).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Invalid configuration in {}", file.path().display())
    );
}

#[test]
fn vault_without_token_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"(credentials: (source: Vault(path: "aws/creds/mail"), vault: (token: None)))"#
    )
    .unwrap();

    let err = config::read(file.path()).unwrap_err();
    assert!(
        err.chain()
            .any(|cause| cause.to_string().contains("credentials.vault.token"))
    );
}
