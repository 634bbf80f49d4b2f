// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use tokenward::test_support::session_tokens;

use super::*;

fn config(dir: &std::path::Path, args: &[&str]) -> anyhow::Result<Config> {
    let dir = dir.display().to_string();
    let mut argv = vec!["tokenward", "--state-dir", dir.as_str()];
    argv.extend_from_slice(args);
    Ok(Config::try_parse_from(argv)?)
}

#[tokio::test]
async fn logout_removes_persisted_session() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = TokenStore::open(FileBackend::new(tmp.path())).await?;
    store.replace(&session_tokens(3600, 86_400)).await?;
    assert!(tmp.path().join("access_token").exists());

    assert_eq!(run(config(tmp.path(), &["logout"])?).await?, 0);

    assert!(!tmp.path().join("access_token").exists());
    assert!(!tmp.path().join("refresh_token").exists());
    Ok(())
}

#[tokio::test]
async fn status_reads_without_auth_service() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    assert_eq!(run(config(tmp.path(), &["status", "--json"])?).await?, 0);
    Ok(())
}
